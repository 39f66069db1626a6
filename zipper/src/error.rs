use chrono::NaiveDate;
use validator::ValidationErrors;
use zipper_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("zipper table `{0}` has no metadata")]
    ConfigNotFound(String),

    #[error("no interval history for the supplied business key in `{0}`")]
    NoHistory(String),

    #[error("no interval with {0} `{1}`")]
    TargetNotFound(String, String),

    #[error("an interval already starts on {0}")]
    DuplicateEffectiveDate(NaiveDate),

    #[error("effective date {0} falls outside the containing interval")]
    Overlap(NaiveDate),

    #[error("interval `{0}` has an invalid validity range")]
    InvalidInterval(String),

    #[error("operation requires an effective date")]
    MissingEffectiveDate,

    #[error("values carry no `{0}` attribute")]
    MissingPrimaryKey(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("store `{0}`")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
