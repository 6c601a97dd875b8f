//! Nimbus DAV - WebDAV transport
//!
//! Provides the async content transport used by the transfer engine:
//! - Streaming downloads to a local file
//! - Streaming uploads from a local file
//! - Normalized response headers (`OC-ETag`, `OC-FileId`, `Date`)
//! - Per-host connection limiting
//!
//! ## Modules
//!
//! - [`client`] - HTTP client bound to one server and account
//! - [`headers`] - Response header extraction
//! - [`status`] - Mapping of client failures onto transport error kinds
//! - [`transport`] - `IRemoteTransport` implementation

pub mod client;
pub mod headers;
pub mod status;
pub mod transport;

pub use client::DavClient;
pub use transport::DavTransport;

use thiserror::Error;

/// Errors that can occur when talking to the WebDAV server
#[derive(Debug, Error)]
pub enum DavError {
    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Reading or writing local content failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured server URL cannot address resources
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The connection limiter was closed
    #[error("Connection limiter is closed")]
    LimiterClosed,
}

impl From<url::ParseError> for DavError {
    fn from(e: url::ParseError) -> Self {
        DavError::InvalidUrl(e.to_string())
    }
}
