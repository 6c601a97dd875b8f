//! WebDAV HTTP client
//!
//! Provides an HTTP client bound to one server and one account. Handles
//! basic authentication, URL construction from remote paths, streaming
//! content transfer and the per-host connection limit.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use nimbus_core::domain::RemotePath;
//! use nimbus_core::ports::NoProgress;
//! use nimbus_dav::DavClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DavClient::with_base_url("https://cloud.example.com", "alice", "secret")?;
//! let remote = RemotePath::new("/remote.php/dav/files/alice/notes.txt".to_string())?;
//! let response = client.get_to_path(&remote, Path::new("/tmp/notes.txt"), &NoProgress).await?;
//! println!("HTTP {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};
use url::Url;

use nimbus_core::config::ServerConfig;
use nimbus_core::domain::RemotePath;
use nimbus_core::ports::{ProgressSink, TransportResponse};

use crate::headers::response_metadata;
use crate::DavError;

/// HTTP client for WebDAV content transfer
///
/// Cheap to clone; clones share the connection pool and the per-host
/// connection limit.
#[derive(Clone)]
pub struct DavClient {
    /// The underlying HTTP client
    http: Client,
    /// Server origin (and optional prefix) every remote path is appended to
    base_url: Url,
    user: String,
    password: String,
    /// Simultaneous requests allowed against the server
    connections: Arc<Semaphore>,
}

impl DavClient {
    /// Creates a client from the server configuration
    pub fn new(
        config: &ServerConfig,
        password: impl Into<String>,
        max_connections_per_host: u32,
    ) -> Result<Self, DavError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(max_connections_per_host as usize)
            .build()?;

        Ok(Self {
            http,
            base_url: parse_base_url(&config.base_url)?,
            user: config.user.clone(),
            password: password.into(),
            connections: Arc::new(Semaphore::new(max_connections_per_host.max(1) as usize)),
        })
    }

    /// Creates a client with default HTTP settings for the given server
    /// (useful for testing)
    pub fn with_base_url(
        base_url: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DavError> {
        Ok(Self {
            http: Client::new(),
            base_url: parse_base_url(base_url)?,
            user: user.into(),
            password: password.into(),
            connections: Arc::new(Semaphore::new(1)),
        })
    }

    /// Replaces the per-host connection limit
    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connections = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Returns the account user name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Builds the absolute URL of a remote path
    ///
    /// Each path segment is percent-encoded.
    pub fn url_for(&self, remote: &RemotePath) -> Result<Url, DavError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DavError::InvalidUrl(format!("{} cannot address resources", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(remote.as_str().split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// Creates an authenticated request builder for the given method and path
    pub fn request(&self, method: Method, remote: &RemotePath) -> Result<RequestBuilder, DavError> {
        let url = self.url_for(remote)?;
        Ok(self
            .http
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password)))
    }

    async fn acquire_connection(&self) -> Result<OwnedSemaphorePermit, DavError> {
        self.connections
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DavError::LimiterClosed)
    }

    /// Downloads a remote file into `destination`
    ///
    /// The body is only written for 2xx responses; otherwise the status is
    /// returned with `bytes = 0` and nothing is created on disk. Progress is
    /// reported with the announced content length, if any.
    pub async fn get_to_path(
        &self,
        remote: &RemotePath,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, DavError> {
        let _permit = self.acquire_connection().await?;
        debug!(remote = %remote, "GET");

        let response = self.request(Method::GET, remote)?.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            debug!(remote = %remote, status = status.as_u16(), "Download refused by server");
            return Ok(response_metadata(status, &headers, 0));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.report(written, total);
        }

        file.flush().await?;
        file.sync_all().await?;

        trace!(remote = %remote, bytes = written, "Download body written");
        Ok(response_metadata(status, &headers, written))
    }

    /// Uploads the content of `source` to a remote path with `PUT`
    pub async fn put_from_path(
        &self,
        remote: &RemotePath,
        source: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, DavError> {
        let _permit = self.acquire_connection().await?;
        debug!(remote = %remote, "PUT");

        let file = tokio::fs::File::open(source).await?;
        let total = file.metadata().await?.len();

        // The body stream must be 'static, so chunk sizes travel back over a
        // channel and are reported here while the request is in flight.
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel::<u64>();
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                let _ = sent_tx.send(bytes.len() as u64);
            }
        });

        let send = self
            .request(Method::PUT, remote)?
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send();
        tokio::pin!(send);

        let mut sent: u64 = 0;
        let response = loop {
            tokio::select! {
                Some(bytes) = sent_rx.recv() => {
                    sent += bytes;
                    progress.report(sent, Some(total));
                }
                result = &mut send => break result?,
            }
        };

        let status = response.status();
        trace!(remote = %remote, status = status.as_u16(), bytes = total, "Upload answered");
        Ok(response_metadata(status, response.headers(), total))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, DavError> {
    let url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(DavError::InvalidUrl(format!(
            "{base_url} cannot address resources"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(p: &str) -> RemotePath {
        RemotePath::new(p.to_string()).unwrap()
    }

    #[test]
    fn test_url_for_encodes_segments() {
        let client = DavClient::with_base_url("https://cloud.example.com", "alice", "pw").unwrap();
        let url = client
            .url_for(&remote("/remote.php/dav/files/alice/My Notes/a#1.txt"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/dav/files/alice/My%20Notes/a%231.txt"
        );
    }

    #[test]
    fn test_url_for_keeps_base_prefix() {
        let client =
            DavClient::with_base_url("https://example.com/nextcloud/", "alice", "pw").unwrap();
        let url = client.url_for(&remote("/remote.php/dav/files/alice")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/nextcloud/remote.php/dav/files/alice"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(DavClient::with_base_url("not a url", "a", "b").is_err());
        assert!(DavClient::with_base_url("mailto:alice@example.com", "a", "b").is_err());
    }

    #[test]
    fn test_new_from_config() {
        let config = ServerConfig {
            base_url: "https://cloud.example.com".to_string(),
            user: "alice".to_string(),
            ..Default::default()
        };
        let client = DavClient::new(&config, "pw", 2).unwrap();
        assert_eq!(client.user(), "alice");
        assert_eq!(client.connections.available_permits(), 2);
    }
}
