use thiserror::Error;

pub type Result<T> = std::result::Result<T, StagingError>;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Invalid staging data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StagingError {
    pub fn invalid<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidData(e.to_string())
    }

    /// Whether a retry at the batch boundary can plausibly succeed.
    ///
    /// Connection-level failures are transient; constraint violations and
    /// malformed rows are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StagingError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}
