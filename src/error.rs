/// Errors raised by the Gold analytics stages.
///
/// The first three variants are the analytic failure taxonomy; the rest wrap
/// I/O and serialization failures from ingestion and persistence.
#[derive(Debug, thiserror::Error)]
pub enum GoldError {
    #[error("data quality error: {0}")]
    DataQuality(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("stale or missing gold artifact for stage `{stage}`: {reason}")]
    StaleArtifact { stage: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("stage task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GoldError {
    pub fn data_quality(message: impl Into<String>) -> Self {
        Self::DataQuality(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }
}

pub type GoldResult<T> = Result<T, GoldError>;
