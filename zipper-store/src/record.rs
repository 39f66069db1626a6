use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    date,
    error::{Result, StoreError},
};

/// One row of a zipper or mirror table: an insertion-ordered mapping of
/// attribute name to value. Business attributes are opaque; the engine only
/// interprets the date and key columns named by [`TableMeta`].
///
/// [`TableMeta`]: crate::TableMeta
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_date(mut self, name: impl Into<String>, date: NaiveDate) -> Self {
        self.set_date(name, date);
        self
    }

    /// Read an attribute as a calendar date. Absent and null attributes are
    /// `None`; present but unparseable values are an error.
    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => date::to_date(value).map(Some),
        }
    }

    pub fn require_date(&self, name: &str) -> Result<NaiveDate> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(StoreError::UnsupportedDate(format!(
                "missing attribute `{name}`"
            ))),
            Some(value) => date::to_date(value),
        }
    }

    pub fn set_date(&mut self, name: impl Into<String>, date: NaiveDate) {
        self.0.insert(name.into(), date::from_date(date));
    }

    /// Canonical text form of an attribute, used for key comparisons.
    /// Absent and null attributes are `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_text(value)),
        }
    }

    /// Overwrite this record's attributes with every attribute of `other`.
    pub fn merge(&mut self, other: &Record) {
        for (name, value) in other.iter() {
            self.0.insert(name.to_owned(), value.clone());
        }
    }

    /// Whether this record carries the same canonical value as `key` for
    /// every one of `columns`.
    pub fn matches(&self, columns: &[String], key: &Record) -> bool {
        columns
            .iter()
            .all(|column| self.text(column) == key.text(column))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Canonical text form of a value: strings as-is, everything else via its
/// JSON rendering. Key and primary-key comparisons go through this form so
/// `1001` and `"1001"` identify the same row.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
