use rankings_common::RankingError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown source: {0}")]
    UnknownSource(i32),
}

impl From<StoreError> for RankingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => RankingError::NotFound(what),
            StoreError::MalformedRow(what) => RankingError::MalformedRow(what),
            StoreError::UnknownSource(id) => RankingError::Validation(format!("unknown source {id}")),
            other => RankingError::Persistence(other.to_string()),
        }
    }
}
