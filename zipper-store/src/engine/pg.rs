use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{
    postgres::{PgArguments, PgRow},
    query::Query,
    Column, PgPool, Postgres, Row, Transaction, TypeInfo,
};

use crate::{
    date,
    engine::{Engine, Session},
    error::{Result, StoreError},
    meta::{BreakStrategy, MetaProvider, TableMeta, TableSql},
    record::Record,
    store::Store,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: &PgPool) -> Store {
        Store::new(Self { pool: pool.clone() })
    }
}

#[async_trait]
impl Engine for PgStore {
    async fn begin(&self) -> Result<Box<dyn Session>> {
        let tx = self.pool.begin().await?;

        Ok(Box::new(PgSession { tx }))
    }
}

pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

impl PgSession {
    async fn run(&mut self, template: &str, meta: &TableMeta, record: &Record) -> Result<()> {
        let (sql, binds) = render(template, meta, record)?;
        push_binds(sqlx::query(&sql), binds)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Session for PgSession {
    async fn query_history(&mut self, meta: &TableMeta, key: &Record) -> Result<Vec<Record>> {
        // Serializes same-key mutators even when the history template
        // matches zero rows and FOR UPDATE has nothing to lock.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(advisory_key(meta, key))
            .execute(&mut *self.tx)
            .await?;

        let (sql, binds) = render(&meta.sql.history, meta, key)?;
        let rows = push_binds(sqlx::query(&sql), binds)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn insert_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        self.run(&meta.sql.insert, meta, record).await
    }

    async fn update_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        self.run(&meta.sql.update, meta, record).await
    }

    async fn delete_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()> {
        self.run(&meta.sql.delete, meta, record).await
    }

    async fn query_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<Option<Record>> {
        let (sql, binds) = render(&meta.sql.mirror_select, meta, key)?;
        let row = push_binds(sqlx::query(&sql), binds)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn upsert_mirror(&mut self, meta: &TableMeta, snapshot: &Record) -> Result<()> {
        self.run(&meta.sql.mirror_upsert, meta, snapshot).await
    }

    async fn delete_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<()> {
        self.run(&meta.sql.mirror_delete, meta, key).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;

        Ok(())
    }
}

fn advisory_key(meta: &TableMeta, key: &Record) -> String {
    let scope = if meta.key_columns.is_empty() {
        key.iter()
            .map(|(name, value)| format!("{name}={}", crate::record::value_text(value)))
            .collect::<Vec<String>>()
    } else {
        meta.key_columns
            .iter()
            .filter_map(|column| key.text(column))
            .collect::<Vec<String>>()
    };

    format!("{}:{}", meta.table, scope.join(":"))
}

enum Bind {
    Date(NaiveDate),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    Null,
}

/// Rewrite `:name` placeholders to positional parameters. A name appearing
/// several times binds once; `::type` casts pass through untouched.
fn render(template: &str, meta: &TableMeta, record: &Record) -> Result<(String, Vec<Bind>)> {
    let mut sql = String::with_capacity(template.len());
    let mut binds = Vec::new();
    let mut seen: Vec<(String, usize)> = Vec::new();
    let mut chars = template.chars().peekable();
    let mut prev = None;

    while let Some(c) = chars.next() {
        let starts_placeholder = c == ':'
            && prev != Some(':')
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_');

        if !starts_placeholder {
            sql.push(c);
            prev = Some(c);
            continue;
        }

        let mut name = String::new();

        while let Some(n) = chars.peek() {
            if n.is_ascii_alphanumeric() || *n == '_' {
                name.push(*n);
                chars.next();
            } else {
                break;
            }
        }

        let index = match seen.iter().find(|(seen_name, _)| *seen_name == name) {
            Some((_, index)) => *index,
            _ => {
                binds.push(bind_value(meta, record, &name)?);
                seen.push((name.clone(), binds.len()));
                binds.len()
            }
        };

        sql.push('$');
        sql.push_str(&index.to_string());
        prev = None;
    }

    Ok((sql, binds))
}

fn bind_value(meta: &TableMeta, record: &Record, name: &str) -> Result<Bind> {
    let value = record
        .get(name)
        .ok_or_else(|| StoreError::MissingParameter(name.to_owned()))?;

    if meta.is_date_column(name) && !value.is_null() {
        return Ok(Bind::Date(date::to_date(value)?));
    }

    Ok(match value {
        Value::Null => Bind::Null,
        Value::Bool(b) => Bind::Bool(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Bind::Int(i),
            (_, Some(f)) => Bind::Float(f),
            _ => Bind::Json(value.clone()),
        },
        Value::String(s) => Bind::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => Bind::Json(value.clone()),
    })
}

fn push_binds(
    query: Query<'_, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'_, Postgres, PgArguments> {
    binds.into_iter().fold(query, |query, bind| match bind {
        Bind::Date(v) => query.bind(v),
        Bind::Text(v) => query.bind(v),
        Bind::Int(v) => query.bind(v),
        Bind::Float(v) => query.bind(v),
        Bind::Bool(v) => query.bind(v),
        Bind::Json(v) => query.bind(v),
        Bind::Null => query.bind(Option::<String>::None),
    })
}

fn row_to_record(row: &PgRow) -> Result<Record> {
    let mut record = Record::new();

    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(name)?.map(Value::from)
            }
            "INT2" => row.try_get::<Option<i16>, _>(name)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(name)?
                .map(|f| Value::from(f64::from(f))),
            "FLOAT8" => row.try_get::<Option<f64>, _>(name)?.map(Value::from),
            "BOOL" => row.try_get::<Option<bool>, _>(name)?.map(Value::from),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(name)?
                .map(date::from_date),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(name)?
                .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(|dt| Value::String(dt.to_rfc3339())),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(name)?,
            other => {
                return Err(StoreError::UnsupportedColumnType(
                    name.to_owned(),
                    other.to_owned(),
                ))
            }
        };

        record.set(name, value.unwrap_or(Value::Null));
    }

    Ok(record)
}

/// Provider reading per-table configuration from a `zipper_table_meta`
/// table:
///
/// ```sql
/// CREATE TABLE zipper_table_meta (
///     zipper_table_name        TEXT PRIMARY KEY,
///     zipper_table_primary_key TEXT NOT NULL,
///     business_key_columns     TEXT,
///     break_strategy           INT4 NOT NULL DEFAULT 0,
///     effective_date_column    TEXT,
///     effective_end_date_column TEXT,
///     effective_status_column  TEXT,
///     zipper_table_select_sql  TEXT NOT NULL,
///     zipper_table_insert_sql  TEXT NOT NULL,
///     zipper_table_update_sql  TEXT NOT NULL,
///     zipper_table_delete_sql  TEXT NOT NULL,
///     business_table_name      TEXT NOT NULL,
///     business_table_select_sql TEXT NOT NULL,
///     business_table_upsert_sql TEXT NOT NULL,
///     business_table_delete_sql TEXT NOT NULL,
///     status                   INT4 NOT NULL DEFAULT 1
/// );
/// ```
///
/// Disabled rows (`status <> 1`) resolve as absent.
#[derive(Debug, Clone)]
pub struct PgMetaProvider {
    pool: PgPool,
    table: String,
}

impl PgMetaProvider {
    pub fn new(pool: &PgPool) -> Self {
        Self::with_table(pool, "zipper_table_meta")
    }

    pub fn with_table(pool: &PgPool, table: impl Into<String>) -> Self {
        Self {
            pool: pool.clone(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl MetaProvider for PgMetaProvider {
    async fn table_meta(&self, table: &str) -> Result<Option<TableMeta>> {
        let sql = format!(
            "SELECT * FROM {} WHERE zipper_table_name = $1 AND status = 1",
            self.table
        );

        let row = match sqlx::query(&sql)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?
        {
            Some(row) => row,
            _ => return Ok(None),
        };

        let mut meta = TableMeta::new(
            row.try_get::<String, _>("zipper_table_name")?,
            row.try_get::<String, _>("business_table_name")?,
            row.try_get::<String, _>("zipper_table_primary_key")?,
        );

        if let Some(columns) = row.try_get::<Option<String>, _>("business_key_columns")? {
            meta.key_columns = columns
                .split(',')
                .map(|column| column.trim().to_owned())
                .filter(|column| !column.is_empty())
                .collect();
        }

        meta.break_strategy =
            BreakStrategy::from_code(i64::from(row.try_get::<i32, _>("break_strategy")?));

        if let Some(column) = row.try_get::<Option<String>, _>("effective_date_column")? {
            meta.effective_date_column = column;
        }

        if let Some(column) = row.try_get::<Option<String>, _>("effective_end_date_column")? {
            meta.effective_end_date_column = column;
        }

        if let Some(column) = row.try_get::<Option<String>, _>("effective_status_column")? {
            meta.effective_status_column = column;
        }

        meta.sql = TableSql {
            history: row.try_get("zipper_table_select_sql")?,
            insert: row.try_get("zipper_table_insert_sql")?,
            update: row.try_get("zipper_table_update_sql")?,
            delete: row.try_get("zipper_table_delete_sql")?,
            mirror_select: row.try_get("business_table_select_sql")?,
            mirror_upsert: row.try_get("business_table_upsert_sql")?,
            mirror_delete: row.try_get("business_table_delete_sql")?,
        };

        Ok(Some(meta))
    }
}
