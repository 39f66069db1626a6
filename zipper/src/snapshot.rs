//! Mirror snapshot selection.
//!
//! The mirror table holds at most one row per business key: the interval
//! covering the reference date, or failing that the next one to become
//! valid. Selection is a pure function of the post-mutation history, so
//! re-running it over an unchanged chain always yields the same row.

use chrono::NaiveDate;
use zipper_store::{EffectiveStatus, Record, TableMeta};

use crate::error::Result;

/// Pick the record to mirror for a business key.
///
/// Among intervals covering `today`, the one with the latest start wins and
/// is stamped [`EffectiveStatus::Current`]; otherwise the future interval
/// with the earliest start wins, stamped [`EffectiveStatus::Future`];
/// otherwise there is nothing to mirror. Rows without both dates carry no
/// validity range and are not considered.
pub fn pick_snapshot(
    meta: &TableMeta,
    history: &[Record],
    today: NaiveDate,
) -> Result<Option<Record>> {
    let mut current: Option<(NaiveDate, &Record)> = None;
    let mut future: Option<(NaiveDate, &Record)> = None;

    for record in history {
        let start = record.date(&meta.effective_date_column)?;
        let end = record.date(&meta.effective_end_date_column)?;

        let (Some(start), Some(end)) = (start, end) else {
            continue;
        };

        if start <= today && today < end {
            if current.map_or(true, |(best, _)| start > best) {
                current = Some((start, record));
            }
        } else if start > today && future.map_or(true, |(best, _)| start < best) {
            future = Some((start, record));
        }
    }

    let (record, status) = match (current, future) {
        (Some((_, record)), _) => (record, EffectiveStatus::Current),
        (_, Some((_, record))) => (record, EffectiveStatus::Future),
        _ => return Ok(None),
    };

    let mut snapshot = record.clone();
    snapshot.set(&meta.effective_status_column, status.code());

    Ok(Some(snapshot))
}
