use chrono::NaiveDate;
use zipper_store::{Record, TableMeta};

use crate::error::{Error, Result};

/// The neighbors of a position in a business key's interval chain. Both
/// lookups are linear scans: per-key histories stay small (one row per
/// historical version of one entity).
pub(crate) struct Neighbors {
    pub prev: Option<Record>,
    pub next: Option<Record>,
}

/// Validity range of one interval row. A missing date or a start after the
/// end means the stored chain is corrupt.
pub(crate) fn bounds(meta: &TableMeta, record: &Record) -> Result<(NaiveDate, NaiveDate)> {
    let start = record.date(&meta.effective_date_column)?;
    let end = record.date(&meta.effective_end_date_column)?;

    match (start, end) {
        (Some(start), Some(end)) if start <= end => Ok((start, end)),
        _ => Err(Error::InvalidInterval(identify(meta, record))),
    }
}

fn identify(meta: &TableMeta, record: &Record) -> String {
    record
        .text(&meta.primary_key)
        .unwrap_or_else(|| "<no primary key>".to_owned())
}

/// Whether any interval (other than `exclude_pk`'s, when given) already
/// starts on `date`.
pub(crate) fn has_duplicate_start(
    meta: &TableMeta,
    history: &[Record],
    date: NaiveDate,
    exclude_pk: Option<&str>,
) -> Result<bool> {
    for record in history {
        if let Some(exclude) = exclude_pk {
            if record.text(&meta.primary_key).as_deref() == Some(exclude) {
                continue;
            }
        }

        let (start, _) = bounds(meta, record)?;

        if start == date {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Locate the insertion neighbors of `date` in ascending history: `prev` is
/// the interval containing `date` as an interior point (the last such one
/// visited wins), `next` the first interval starting on or after `date`;
/// the scan stops once `next` is found.
pub(crate) fn find_by_date(
    meta: &TableMeta,
    history: &[Record],
    date: NaiveDate,
) -> Result<Neighbors> {
    let mut prev = None;
    let mut next = None;

    for record in history {
        let (start, end) = bounds(meta, record)?;

        if start <= date && date < end {
            prev = Some(record.clone());
        }

        if start >= date {
            next = Some(record.clone());
            break;
        }
    }

    Ok(Neighbors { prev, next })
}

/// Locate `target`'s neighbors by boundary adjacency: `prev` ends where the
/// target starts, `next` starts where the target ends. The scan skips the
/// target itself and stops once both are found.
pub(crate) fn find_adjacent(
    meta: &TableMeta,
    history: &[Record],
    target: &Record,
) -> Result<Neighbors> {
    let (target_start, target_end) = bounds(meta, target)?;
    let target_pk = target.text(&meta.primary_key);

    let mut prev = None;
    let mut next = None;

    for record in history {
        if record.text(&meta.primary_key) == target_pk {
            continue;
        }

        let (start, end) = bounds(meta, record)?;

        if end == target_start {
            prev = Some(record.clone());
        }

        if start == target_end {
            next = Some(record.clone());
        }

        if prev.is_some() && next.is_some() {
            break;
        }
    }

    Ok(Neighbors { prev, next })
}

/// Find the interval whose primary-key attribute has the canonical text
/// form `value`. Rows without a primary key are skipped.
pub(crate) fn find_by_primary_key<'a>(
    meta: &TableMeta,
    history: &'a [Record],
    value: &str,
) -> Option<&'a Record> {
    history
        .iter()
        .find(|record| record.text(&meta.primary_key).as_deref() == Some(value))
}
