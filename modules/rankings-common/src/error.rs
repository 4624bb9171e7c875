use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankingError>;

/// Failures that abort a single job or reject a single request.
///
/// Soft fetch timeouts, out-of-range items, and under-extraction are not
/// errors: they are logged and counted in the job report.
#[derive(Error, Debug)]
pub enum RankingError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("No main content found at {0}")]
    ExtractionEmpty(String),

    #[error("Inference response violates schema: {0}")]
    SchemaValidation(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
