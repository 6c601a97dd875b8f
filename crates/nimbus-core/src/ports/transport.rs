//! Remote transport port (driven/secondary port)
//!
//! This module defines the request/response channel used to move file
//! content to and from the server. The transport only reports what the
//! server said; interpreting it is the engine's job.
//!
//! ## Design Notes
//!
//! - Returns a typed [`TransportError`] instead of `anyhow::Result` because
//!   the engine must tell connectivity failures apart from other failures.
//! - A completed exchange with a non-2xx status is still `Ok`; the status
//!   is carried in [`TransportResponse`].
//! - Header values arrive already normalized: version tokens unquoted,
//!   identifiers validated, dates parsed.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::{ItemId, RemotePath, VersionToken};

// ============================================================================
// Progress reporting
// ============================================================================

/// Receives byte counters while a transfer is running
///
/// `total` is `None` when the server did not announce a length.
pub trait ProgressSink: Send + Sync {
    fn report(&self, transferred: u64, total: Option<u64>);
}

/// A sink that drops every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _transferred: u64, _total: Option<u64>) {}
}

// ============================================================================
// Response and error types
// ============================================================================

/// Outcome of a completed HTTP exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// `OC-ETag`, else `ETag`
    pub version_token: Option<VersionToken>,
    /// `OC-FileId`
    pub file_id: Option<ItemId>,
    /// `Date`
    pub date: Option<DateTime<Utc>>,
    /// `Last-Modified`
    pub last_modified: Option<DateTime<Utc>>,
    /// Bytes written (download) or sent (upload)
    pub bytes: u64,
}

impl TransportResponse {
    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Classification of transport-level failures (no HTTP status available)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    TimedOut,
    CannotConnect,
    ConnectionLost,
    NotConnected,
    Io,
    Other,
}

impl TransportErrorKind {
    /// Returns true for connectivity-class failures
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportErrorKind::TimedOut
                | TransportErrorKind::CannotConnect
                | TransportErrorKind::ConnectionLost
                | TransportErrorKind::NotConnected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.kind.is_unreachable()
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::CannotConnect => "cannot connect",
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::NotConnected => "not connected",
            TransportErrorKind::Io => "i/o error",
            TransportErrorKind::Other => "transport error",
        };
        f.write_str(text)
    }
}

/// Human-readable description of an HTTP status returned by the server
pub fn describe_status(status: u16) -> String {
    let text = match status {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        409 => "Conflict",
        412 => "Precondition failed",
        423 => "Locked",
        500 => "Internal server error",
        502 => "Bad gateway",
        503 => "Service unavailable",
        507 => "Insufficient storage",
        _ => return format!("Unexpected server response (HTTP {status})"),
    };
    text.to_string()
}

// ============================================================================
// IRemoteTransport trait
// ============================================================================

#[async_trait::async_trait]
pub trait IRemoteTransport: Send + Sync {
    /// Downloads `remote` into `destination`, overwriting it
    ///
    /// On a non-2xx status the destination may be left absent or empty.
    async fn download(
        &self,
        remote: &RemotePath,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError>;

    /// Uploads the content of `source` to `remote`
    async fn upload(
        &self,
        remote: &RemotePath,
        source: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError>;
}
