//! Error handling module
//!
//! Signals raised inside a pipeline. Pipelines convert every one of these
//! into an `Outcome`; none of them reach a caller.

/// Errors raised by a unit of work or transaction
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The cancellation token fired while persisting
    #[error("Persistence was cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Commit or rollback on a transaction that already ended
    #[error("Transaction is no longer active")]
    TransactionClosed,

    #[error("Persistence failure: {0}")]
    Store(String),
}

impl PersistenceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PersistenceError::Cancelled)
    }
}

/// Signal raised by operation-specific logic
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The logic observed cancellation
    #[error("Operation was cancelled")]
    Cancelled,

    /// Any other fault; its message becomes the outcome error
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn fault(message: impl Into<String>) -> Self {
        HandlerError::Fault(anyhow::anyhow!(message.into()))
    }
}

impl From<PersistenceError> for HandlerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Cancelled => HandlerError::Cancelled,
            other => HandlerError::Fault(other.into()),
        }
    }
}
