#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unsupported date representation `{0}`")]
    UnsupportedDate(String),

    #[error("sql template references parameter `{0}` missing from the record")]
    MissingParameter(String),

    #[error("table `{0}` declares no business key columns")]
    MissingKeyColumns(String),

    #[error("no row with {0} `{1}` in table `{2}`")]
    RowNotFound(String, String, String),

    #[error("cannot decode column `{0}` of type `{1}`")]
    UnsupportedColumnType(String, String),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
