use chrono::{NaiveDate, Utc};
use validator::Validate;
use zipper_store::{BreakStrategy, MetaProvider, Record, Session, Store, TableMeta, MAX_END_DATE};

use crate::{
    error::{Error, Result},
    interval::{self, Neighbors},
    request::MutationRequest,
    snapshot,
};

/// The interval-mutation engine.
///
/// Stateless over a shared [`Store`]: every operation resolves the table's
/// metadata, opens one session, mutates the business key's interval chain,
/// re-projects the mirror snapshot from the re-read history, and commits.
/// Any failure rolls the session back, leaving no partial writes.
#[derive(Clone)]
pub struct Zipper {
    store: Store,
    meta: Box<dyn MetaProvider>,
    today: Option<NaiveDate>,
}

impl Zipper {
    pub fn new<P: MetaProvider + 'static>(store: Store, provider: P) -> Self {
        Self {
            store,
            meta: Box::new(provider),
            today: None,
        }
    }

    /// Override the reference date classifying snapshots as current or
    /// future. Defaults to the UTC calendar date; fix it for replays and
    /// deterministic tests.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn table_meta(&self, table: &str) -> Result<TableMeta> {
        self.meta
            .table_meta(table)
            .await?
            .ok_or_else(|| Error::ConfigNotFound(table.to_owned()))
    }

    /// Add a new interval starting on the request's effective date,
    /// shrinking the containing interval so the chain stays contiguous.
    pub async fn insert(&self, request: MutationRequest) -> Result<()> {
        request.validate()?;

        let meta = self.table_meta(&request.table).await?;
        let effective = request.effective_date.ok_or(Error::MissingEffectiveDate)?;

        let mut session = self.store.begin().await?;
        let outcome = insert_in(&mut *session, &meta, &request.values, effective, self.today()).await;

        tracing::info!(table = %meta.table, %effective, ok = outcome.is_ok(), "insert interval");

        finish(session, outcome).await
    }

    /// Merge changed attributes into the interval identified by the
    /// primary-key attribute; a changed effective date restructures the
    /// chain as an atomic delete-then-insert.
    pub async fn update(&self, request: MutationRequest) -> Result<()> {
        request.validate()?;

        let meta = self.table_meta(&request.table).await?;

        let mut session = self.store.begin().await?;
        let outcome = update_in(
            &mut *session,
            &meta,
            &request.values,
            request.effective_date,
            self.today(),
        )
        .await;

        tracing::info!(table = %meta.table, ok = outcome.is_ok(), "update interval");

        finish(session, outcome).await
    }

    /// Remove the interval identified by the primary-key attribute,
    /// repairing the resulting break per the table's strategy.
    pub async fn delete(&self, request: MutationRequest) -> Result<()> {
        request.validate()?;

        let meta = self.table_meta(&request.table).await?;

        let mut session = self.store.begin().await?;
        let outcome = delete_in(&mut *session, &meta, &request.values, self.today()).await;

        tracing::info!(table = %meta.table, ok = outcome.is_ok(), "delete interval");

        finish(session, outcome).await
    }

    /// Read the mirrored snapshot for a business key, if any.
    pub async fn snapshot(&self, table: &str, key: &Record) -> Result<Option<Record>> {
        let meta = self.table_meta(table).await?;

        let mut session = self.store.begin().await?;
        let outcome = session.query_mirror(&meta, key).await;
        session.rollback().await?;

        Ok(outcome?)
    }
}

async fn finish(session: Box<dyn Session>, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => {
            session.commit().await?;

            Ok(())
        }
        Err(e) => {
            session.rollback().await?;

            Err(e)
        }
    }
}

async fn insert_in(
    session: &mut dyn Session,
    meta: &TableMeta,
    values: &Record,
    effective: NaiveDate,
    today: NaiveDate,
) -> Result<()> {
    let history = session.query_history(meta, values).await?;

    if interval::has_duplicate_start(meta, &history, effective, None)? {
        return Err(Error::DuplicateEffectiveDate(effective));
    }

    place_interval(session, meta, values, effective, &history).await?;

    project(session, meta, values, today).await
}

async fn delete_in(
    session: &mut dyn Session,
    meta: &TableMeta,
    values: &Record,
    today: NaiveDate,
) -> Result<()> {
    let history = session.query_history(meta, values).await?;

    if history.is_empty() {
        return Err(Error::NoHistory(meta.table.clone()));
    }

    let target = locate_target(meta, &history, values)?;
    let neighbors = interval::find_adjacent(meta, &history, &target)?;

    repair_break(session, meta, &target, neighbors).await?;
    session.delete_interval(meta, &target).await?;

    project(session, meta, values, today).await
}

async fn update_in(
    session: &mut dyn Session,
    meta: &TableMeta,
    values: &Record,
    explicit_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<()> {
    let history = session.query_history(meta, values).await?;

    if history.is_empty() {
        return Err(Error::NoHistory(meta.table.clone()));
    }

    let target = locate_target(meta, &history, values)?;

    let new_date = match explicit_date {
        Some(date) => date,
        _ => values
            .date(&meta.effective_date_column)?
            .ok_or(Error::MissingEffectiveDate)?,
    };

    let (original, _) = interval::bounds(meta, &target)?;

    if new_date == original {
        // Boundaries stay put; only the business attributes change.
        let mut merged = target.clone();
        merged.merge(values);
        session.update_interval(meta, &merged).await?;
    } else {
        tracing::debug!(table = %meta.table, from = %original, to = %new_date, "moving interval");

        let target_pk = target.text(&meta.primary_key);

        if interval::has_duplicate_start(meta, &history, new_date, target_pk.as_deref())? {
            return Err(Error::DuplicateEffectiveDate(new_date));
        }

        let neighbors = interval::find_adjacent(meta, &history, &target)?;

        repair_break(session, meta, &target, neighbors).await?;
        session.delete_interval(meta, &target).await?;

        let history = session.query_history(meta, values).await?;
        let mut replacement = target.clone();
        replacement.merge(values);

        place_interval(session, meta, &replacement, new_date, &history).await?;
    }

    project(session, meta, values, today).await
}

fn locate_target(meta: &TableMeta, history: &[Record], values: &Record) -> Result<Record> {
    let value = values
        .text(&meta.primary_key)
        .ok_or_else(|| Error::MissingPrimaryKey(meta.primary_key.clone()))?;

    interval::find_by_primary_key(meta, history, &value)
        .cloned()
        .ok_or_else(|| Error::TargetNotFound(meta.primary_key.clone(), value))
}

/// Insert `values` as an interval starting on `effective`, adjusting the
/// neighbors located in `history`: the containing interval shrinks to end
/// on `effective`, and the new row ends where the first interval starting
/// on or after `effective` begins (or stays open). Ending the new row
/// exactly on the successor's start keeps the right boundary contiguous
/// without touching the successor.
async fn place_interval(
    session: &mut dyn Session,
    meta: &TableMeta,
    values: &Record,
    effective: NaiveDate,
    history: &[Record],
) -> Result<()> {
    let Neighbors { prev, next } = interval::find_by_date(meta, history, effective)?;

    if let Some(prev) = &prev {
        let (_, prev_end) = interval::bounds(meta, prev)?;

        if effective >= prev_end {
            return Err(Error::Overlap(effective));
        }
    }

    let end = match &next {
        Some(next) => interval::bounds(meta, next)?.0,
        _ => MAX_END_DATE,
    };

    if let Some(mut prev) = prev {
        tracing::debug!(table = %meta.table, until = %effective, "shrinking containing interval");

        prev.set_date(&meta.effective_end_date_column, effective);
        session.update_interval(meta, &prev).await?;
    }

    let mut record = values.clone();
    record.set_date(&meta.effective_date_column, effective);
    record.set_date(&meta.effective_end_date_column, end);

    session.insert_interval(meta, &record).await?;

    Ok(())
}

/// Close the gap a removed middle interval leaves behind. Exactly one
/// neighbor is rewritten: the predecessor stretches over the removed range,
/// or the successor's start moves back to cover it. Removing the latest
/// interval instead promotes the predecessor to the open end date; removing
/// the earliest or the sole interval needs no repair.
async fn repair_break(
    session: &mut dyn Session,
    meta: &TableMeta,
    target: &Record,
    neighbors: Neighbors,
) -> Result<()> {
    let (target_start, target_end) = interval::bounds(meta, target)?;

    match (neighbors.prev, neighbors.next) {
        (Some(mut prev), Some(mut next)) => match meta.break_strategy {
            BreakStrategy::ExtendPrevious => {
                tracing::debug!(table = %meta.table, until = %target_end, "extending predecessor");

                prev.set_date(&meta.effective_end_date_column, target_end);
                session.update_interval(meta, &prev).await?;
            }
            BreakStrategy::ShiftNext => {
                tracing::debug!(table = %meta.table, from = %target_start, "shifting successor");

                next.set_date(&meta.effective_date_column, target_start);
                session.update_interval(meta, &next).await?;
            }
        },
        (Some(mut prev), None) => {
            let (_, prev_end) = interval::bounds(meta, &prev)?;

            // The predecessor becomes the new latest interval.
            if prev_end != MAX_END_DATE {
                prev.set_date(&meta.effective_end_date_column, MAX_END_DATE);
                session.update_interval(meta, &prev).await?;
            }
        }
        // Removing the earliest interval: the successor already starts its
        // own chain. Removing the sole interval: nothing left to repair.
        (None, _) => {}
    }

    Ok(())
}

async fn project(
    session: &mut dyn Session,
    meta: &TableMeta,
    key: &Record,
    today: NaiveDate,
) -> Result<()> {
    let history = session.query_history(meta, key).await?;

    match snapshot::pick_snapshot(meta, &history, today)? {
        Some(snapshot) => {
            tracing::debug!(table = %meta.mirror_table, "refreshing mirror snapshot");
            session.upsert_mirror(meta, &snapshot).await?;
        }
        _ => {
            tracing::debug!(table = %meta.mirror_table, "clearing mirror row");
            session.delete_mirror(meta, key).await?;
        }
    }

    Ok(())
}
