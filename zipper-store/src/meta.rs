use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use dyn_clone::DynClone;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Policy for repairing the gap left when a middle interval is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakStrategy {
    /// Extend the predecessor: its end date becomes the removed interval's
    /// end date.
    #[default]
    ExtendPrevious,
    /// Shift the successor: its start date moves back to the removed
    /// interval's start date.
    ShiftNext,
}

impl BreakStrategy {
    /// Wire value stored in metadata tables (0 extends, anything else shifts).
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Self::ExtendPrevious
        } else {
            Self::ShiftNext
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::ExtendPrevious => 0,
            Self::ShiftNext => 1,
        }
    }
}

/// Validity state written into the mirror table's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Future,
    Current,
}

impl EffectiveStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Future => 0,
            Self::Current => 1,
        }
    }
}

/// SQL templates driving one zipper table and its mirror table. Templates
/// are opaque pre-resolved strings using `:name` placeholders bound from the
/// record at execution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSql {
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub insert: String,
    #[serde(default)]
    pub update: String,
    #[serde(default)]
    pub delete: String,
    #[serde(default)]
    pub mirror_select: String,
    #[serde(default)]
    pub mirror_upsert: String,
    #[serde(default)]
    pub mirror_delete: String,
}

/// Immutable per-table configuration resolved through a [`MetaProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Zipper (history) table name.
    pub table: String,
    /// Mirror table holding the presently-or-soon relevant snapshot.
    pub mirror_table: String,
    /// Column uniquely identifying one interval row.
    pub primary_key: String,
    /// Columns scoping "history of the same business entity".
    #[serde(default)]
    pub key_columns: Vec<String>,
    #[serde(default)]
    pub break_strategy: BreakStrategy,
    #[serde(default = "default_effective_date_column")]
    pub effective_date_column: String,
    #[serde(default = "default_effective_end_date_column")]
    pub effective_end_date_column: String,
    #[serde(default = "default_effective_status_column")]
    pub effective_status_column: String,
    #[serde(default)]
    pub sql: TableSql,
}

fn default_effective_date_column() -> String {
    "effectiveDate".to_owned()
}

fn default_effective_end_date_column() -> String {
    "effectiveEndDate".to_owned()
}

fn default_effective_status_column() -> String {
    "effectiveStatus".to_owned()
}

impl TableMeta {
    pub fn new(
        table: impl Into<String>,
        mirror_table: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            mirror_table: mirror_table.into(),
            primary_key: primary_key.into(),
            key_columns: Vec::new(),
            break_strategy: BreakStrategy::default(),
            effective_date_column: default_effective_date_column(),
            effective_end_date_column: default_effective_end_date_column(),
            effective_status_column: default_effective_status_column(),
            sql: TableSql::default(),
        }
    }

    pub fn key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn break_strategy(mut self, strategy: BreakStrategy) -> Self {
        self.break_strategy = strategy;
        self
    }

    pub fn date_columns(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.effective_date_column = start.into();
        self.effective_end_date_column = end.into();
        self
    }

    pub fn status_column(mut self, column: impl Into<String>) -> Self {
        self.effective_status_column = column.into();
        self
    }

    pub fn sql(mut self, sql: TableSql) -> Self {
        self.sql = sql;
        self
    }

    /// Whether `name` is one of the two configured calendar-date columns.
    pub fn is_date_column(&self, name: &str) -> bool {
        name == self.effective_date_column || name == self.effective_end_date_column
    }
}

#[async_trait]
pub trait MetaProvider: DynClone + Send + Sync {
    async fn table_meta(&self, table: &str) -> Result<Option<TableMeta>>;
}

dyn_clone::clone_trait_object!(MetaProvider);

/// Registry-backed provider for tests and embedded configuration.
#[derive(Clone, Default)]
pub struct MemoryMetaProvider(Arc<RwLock<HashMap<String, TableMeta>>>);

impl MemoryMetaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, meta: TableMeta) {
        self.0.write().insert(meta.table.clone(), meta);
    }

    pub fn with(self, meta: TableMeta) -> Self {
        self.register(meta);
        self
    }
}

#[async_trait]
impl MetaProvider for MemoryMetaProvider {
    async fn table_meta(&self, table: &str) -> Result<Option<TableMeta>> {
        Ok(self.0.read().get(table).cloned())
    }
}
