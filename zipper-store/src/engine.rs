use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{error::Result, meta::TableMeta, record::Record};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;

#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Open one atomic unit of work. Every mutation of a business key's
    /// intervals and its mirror row happens inside a single session.
    async fn begin(&self) -> Result<Box<dyn Session>>;
}

dyn_clone::clone_trait_object!(Engine);

/// One storage transaction. Dropping a session without committing discards
/// its writes.
#[async_trait]
pub trait Session: Send {
    /// Full interval history for `key`, ascending by effective date. The
    /// read locks the key's rows so concurrent mutators of the same
    /// business key serialize against this session.
    async fn query_history(&mut self, meta: &TableMeta, key: &Record) -> Result<Vec<Record>>;

    async fn insert_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()>;

    async fn update_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()>;

    async fn delete_interval(&mut self, meta: &TableMeta, record: &Record) -> Result<()>;

    async fn query_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<Option<Record>>;

    async fn upsert_mirror(&mut self, meta: &TableMeta, snapshot: &Record) -> Result<()>;

    async fn delete_mirror(&mut self, meta: &TableMeta, key: &Record) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
