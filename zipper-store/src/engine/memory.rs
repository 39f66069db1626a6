use async_trait::async_trait;
use chrono::NaiveDate;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    engine::{Engine, Session},
    error::{Result, StoreError},
    meta::TableMeta,
    record::Record,
    store::Store,
};

/// In-process engine for tests and embedded use. Sessions serialize on one
/// async mutex, which is held for the whole unit of work; dropping a session
/// without committing restores the pre-session state.
#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<Mutex<MemoryState>>);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    zipper: HashMap<String, Vec<Record>>,
    mirror: HashMap<String, Vec<Record>>,
}

impl Memory {
    pub fn new() -> Store {
        Store::new(Self::default())
    }
}

#[async_trait]
impl Engine for Memory {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        let guard = Arc::clone(&self.0).lock_owned().await;
        let undo = MemoryState::clone(&guard);

        Ok(Box::new(MemorySession {
            guard,
            undo,
            committed: false,
        }))
    }
}

struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    undo: MemoryState,
    committed: bool,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if !self.committed {
            std::mem::swap(&mut *self.guard, &mut self.undo);
        }
    }
}

impl MemorySession {
    fn position_by_primary_key(
        rows: &[Record],
        meta: &TableMeta,
        record: &Record,
    ) -> Result<usize> {
        let value = record
            .text(&meta.primary_key)
            .ok_or_else(|| StoreError::MissingParameter(meta.primary_key.clone()))?;

        rows.iter()
            .position(|row| row.text(&meta.primary_key).as_deref() == Some(value.as_str()))
            .ok_or_else(|| {
                StoreError::RowNotFound(meta.primary_key.clone(), value, meta.table.clone())
            })
    }

    fn require_key_columns(meta: &TableMeta) -> Result<()> {
        if meta.key_columns.is_empty() {
            return Err(StoreError::MissingKeyColumns(meta.table.clone()));
        }

        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn query_history(&mut self, meta: &TableMeta, key: &Record) -> Result<Vec<Record>> {
        Self::require_key_columns(meta)?;

        let rows = match self.guard.zipper.get(&meta.table) {
            Some(rows) => rows,
            _ => return Ok(Vec::new()),
        };

        let mut dated = Vec::new();

        for row in rows {
            if !row.matches(&meta.key_columns, key) {
                continue;
            }

            let date: Option<NaiveDate> = row.date(&meta.effective_date_column)?;
            dated.push((date, row.clone()));
        }

        dated.sort_by_key(|(date, _)| *date);

        Ok(dated.into_iter().map(|(_, row)| row).collect())
    }

    async fn insert_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        self.guard
            .zipper
            .entry(meta.table.clone())
            .or_default()
            .push(record.clone());

        Ok(())
    }

    async fn update_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        let rows = self.guard.zipper.entry(meta.table.clone()).or_default();
        let position = Self::position_by_primary_key(rows, meta, record)?;
        rows[position] = record.clone();

        Ok(())
    }

    async fn delete_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        let rows = self.guard.zipper.entry(meta.table.clone()).or_default();
        let position = Self::position_by_primary_key(rows, meta, record)?;
        rows.remove(position);

        Ok(())
    }

    async fn query_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<Option<Record>> {
        Self::require_key_columns(meta)?;

        let row = self
            .guard
            .mirror
            .get(&meta.mirror_table)
            .and_then(|rows| rows.iter().find(|row| row.matches(&meta.key_columns, key)))
            .cloned();

        Ok(row)
    }

    async fn upsert_mirror(&mut self, meta: &TableMeta, snapshot: &Record) -> Result<()> {
        Self::require_key_columns(meta)?;

        let rows = self.guard.mirror.entry(meta.mirror_table.clone()).or_default();

        match rows
            .iter()
            .position(|row| row.matches(&meta.key_columns, snapshot))
        {
            Some(position) => rows[position] = snapshot.clone(),
            _ => rows.push(snapshot.clone()),
        }

        Ok(())
    }

    async fn delete_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<()> {
        Self::require_key_columns(meta)?;

        if let Some(rows) = self.guard.mirror.get_mut(&meta.mirror_table) {
            rows.retain(|row| !row.matches(&meta.key_columns, key));
        }

        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.committed = true;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
