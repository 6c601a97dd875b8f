//! Error types for the synchronization engine.
//!
//! Defines `ProviderError`, returned by the facade, the transfer engine and
//! the completion queue. Transfer failures are absorbed into item records;
//! the variants here reach callers only when no record state can express
//! the problem.

use nimbus_core::domain::DomainError;
use thiserror::Error;

/// Result type for engine and facade operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced by the provider facade and its collaborators.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The identifier or path does not resolve to a catalogued item yet
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transfer failed: {message}")]
    TransferFailed {
        message: String,
        status_code: Option<u16>,
    },

    #[error("server unreachable: {0}")]
    ServerUnreachable(String),

    /// Version token mismatch reported by the server
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A transfer of the other kind is outstanding for the same path
    #[error("transfer in progress: {0}")]
    TransferInProgress(String),

    /// The item has local modifications that are not uploaded yet
    #[error("pending changes: {0}")]
    PendingChanges(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("completion queue has stopped")]
    QueueClosed,
}

impl ProviderError {
    /// Returns true for failures a later retry may resolve
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::TransferFailed { .. } | ProviderError::ServerUnreachable(_)
        )
    }
}

impl From<DomainError> for ProviderError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidState { from, to } => ProviderError::TransferInProgress(format!(
                "cannot move from {from} to {to}"
            )),
            other => ProviderError::InvalidRecord(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::Database(format!("{err:#}"))
    }
}
