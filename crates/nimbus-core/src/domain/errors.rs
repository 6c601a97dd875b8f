//! Errors raised by domain constructors and the item state machine

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected by `ItemStatus::can_transition_to`
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        from: String,
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid item identifier
    #[error("Invalid item ID: {0}")]
    InvalidItemId(String),

    /// Invalid version token (etag)
    #[error("Invalid version token: {0}")]
    InvalidVersionToken(String),

    /// Invalid correlation token
    #[error("Invalid correlation token: {0}")]
    InvalidCorrelationToken(String),

    /// A record could not be constructed from the supplied fields
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
