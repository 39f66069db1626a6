#![forbid(unsafe_code)]

//! Interval-mutation engine for zipper tables.
//!
//! A zipper table records, per business key, a chain of non-overlapping,
//! gapless `[effectiveDate, effectiveEndDate)` intervals describing how an
//! entity's attributes changed over time, with `9999-12-31` marking the open
//! latest interval. A derived mirror table holds the single
//! presently-or-soon relevant snapshot per business key.
//!
//! [`Zipper`] is the entry point: [`insert`](Zipper::insert),
//! [`update`](Zipper::update) and [`delete`](Zipper::delete) each run inside
//! one storage session — locking history read, neighbor repair, the target
//! write, and the mirror re-projection — and roll back as a unit on any
//! failure.

mod engine;
mod error;
mod interval;
mod request;
pub mod snapshot;

pub use engine::*;
pub use error::*;
pub use request::*;

#[cfg(feature = "memory")]
pub use zipper_store::Memory;
#[cfg(feature = "pg")]
pub use zipper_store::{PgMetaProvider, PgStore};
pub use zipper_store::{
    BreakStrategy, EffectiveStatus, MemoryMetaProvider, MetaProvider, Record, Session, Store,
    StoreError, TableMeta, TableSql, MAX_END_DATE,
};
