use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Exclusive end date of the open (latest) interval of a business key.
pub const MAX_END_DATE: NaiveDate = match NaiveDate::from_ymd_opt(9999, 12, 31) {
    Some(d) => d,
    None => unreachable!(),
};

/// Normalize a stored attribute value to a calendar date.
///
/// Accepts ISO dates (`2024-03-01`), ISO date-times with an optional
/// offset, and already-typed JSON strings produced by [`from_date`].
/// Everything else is a storage corruption and surfaces as
/// [`StoreError::UnsupportedDate`].
pub fn to_date(value: &Value) -> Result<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        other => Err(StoreError::UnsupportedDate(other.to_string())),
    }
}

pub fn from_date(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

fn parse_date_str(s: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    // Drivers commonly render timestamps with a space separator.
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt.date());
    }

    Err(StoreError::UnsupportedDate(s.to_owned()))
}
