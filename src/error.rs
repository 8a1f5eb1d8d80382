use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepoError {
    /// `build()` was asked for before the statement had a valid shape.
    #[error("Builder state error: {0}")]
    BuilderState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// No handle became available within the configured acquire timeout.
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Pool closed")]
    PoolClosed,

    /// The backend rejected or failed a statement.
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Row mapping error: {0}")]
    RowMapping(String),
}

impl RepoError {
    /// Whether the caller may reasonably retry (with backoff) after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::PoolExhausted(_))
    }
}
