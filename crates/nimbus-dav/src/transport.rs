//! `IRemoteTransport` implementation over WebDAV
//!
//! Thin adapter translating [`DavClient`] results into the transport port's
//! types. Non-2xx answers are returned as-is; only failures without an HTTP
//! status become [`TransportError`]s.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use nimbus_core::domain::RemotePath;
use nimbus_core::ports::{
    IRemoteTransport, ProgressSink, TransportError, TransportResponse,
};

use crate::client::DavClient;

/// Remote transport backed by a shared [`DavClient`]
#[derive(Clone)]
pub struct DavTransport {
    client: Arc<DavClient>,
}

impl DavTransport {
    pub fn new(client: DavClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &DavClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteTransport for DavTransport {
    async fn download(
        &self,
        remote: &RemotePath,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError> {
        match self.client.get_to_path(remote, destination, progress).await {
            Ok(response) => {
                debug!(remote = %remote, status = response.status, bytes = response.bytes, "Download answered");
                Ok(response)
            }
            Err(e) => {
                warn!(remote = %remote, error = %e, "Download failed without a response");
                Err(e.into())
            }
        }
    }

    async fn upload(
        &self,
        remote: &RemotePath,
        source: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransportResponse, TransportError> {
        match self.client.put_from_path(remote, source, progress).await {
            Ok(response) => {
                debug!(
                    remote = %remote,
                    status = response.status,
                    file_id = ?response.file_id,
                    "Upload answered"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(remote = %remote, error = %e, "Upload failed without a response");
                Err(e.into())
            }
        }
    }
}
