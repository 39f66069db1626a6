use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use zipper_store::Record;

/// One insert/update/delete against a zipper table.
///
/// `values` carries the business key, the primary-key attribute where the
/// operation targets an existing interval, and any business attributes to
/// write. `effective_date` is required for insert; update falls back to a
/// date-valued attribute already present in `values`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MutationRequest {
    #[validate(length(min = 1, message = "zipper table name must not be empty"))]
    pub table: String,

    #[validate(custom = "non_empty_values")]
    pub values: Record,

    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

impl MutationRequest {
    pub fn new(table: impl Into<String>, values: Record) -> Self {
        Self {
            table: table.into(),
            values,
            effective_date: None,
        }
    }

    pub fn effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }
}

fn non_empty_values(values: &Record) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::new("values_empty"));
    }

    Ok(())
}
