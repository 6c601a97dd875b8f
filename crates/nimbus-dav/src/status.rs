//! Classification of client failures
//!
//! Failures that never produced an HTTP status are reduced to a
//! [`TransportErrorKind`] so the engine can tell an unreachable server from
//! other errors.

use nimbus_core::ports::{TransportError, TransportErrorKind};

use crate::DavError;

/// Maps a reqwest failure onto a transport error kind
pub fn classify(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        TransportErrorKind::TimedOut
    } else if error.is_connect() {
        TransportErrorKind::CannotConnect
    } else if error.is_request() || error.is_body() || error.is_decode() {
        TransportErrorKind::ConnectionLost
    } else {
        TransportErrorKind::Other
    }
}

impl From<DavError> for TransportError {
    fn from(error: DavError) -> Self {
        let kind = match &error {
            DavError::Network(e) => classify(e),
            DavError::Io(_) => TransportErrorKind::Io,
            DavError::InvalidUrl(_) => TransportErrorKind::Other,
            DavError::LimiterClosed => TransportErrorKind::NotConnected,
        };
        TransportError::new(kind, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_not_unreachable() {
        let err: TransportError =
            DavError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).into();
        assert_eq!(err.kind, TransportErrorKind::Io);
        assert!(!err.is_unreachable());
        assert!(err.message.contains("disk full"));
    }

    #[test]
    fn test_closed_limiter_is_unreachable() {
        let err: TransportError = DavError::LimiterClosed.into();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_refused_connection_is_cannot_connect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await;
        let err = result.unwrap_err();
        assert!(classify(&err).is_unreachable());
    }
}
