//! Shared test helpers for WebDAV integration tests
//!
//! Provides a wiremock server plus a transport pointed at it, and a
//! progress sink that records every report.

use std::sync::Mutex;

use wiremock::MockServer;

use nimbus_core::domain::RemotePath;
use nimbus_core::ports::ProgressSink;
use nimbus_dav::{DavClient, DavTransport};

pub const USER: &str = "alice";
pub const PASSWORD: &str = "secret";

/// Starts a mock server and returns a (MockServer, DavTransport) tuple.
pub async fn setup_dav_mock() -> (MockServer, DavTransport) {
    let server = MockServer::start().await;
    let client = DavClient::with_base_url(&server.uri(), USER, PASSWORD).unwrap();
    (server, DavTransport::new(client))
}

/// Remote path of `name` in the test account's home
pub fn remote(name: &str) -> RemotePath {
    RemotePath::new(format!("/remote.php/dav/files/{USER}/{name}")).unwrap()
}

/// URL path the mock server sees for `name`
pub fn url_path(name: &str) -> String {
    format!("/remote.php/dav/files/{USER}/{name}")
}

/// Progress sink that keeps every report
#[derive(Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<(u64, Option<u64>)>>,
}

impl RecordingProgress {
    pub fn reports(&self) -> Vec<(u64, Option<u64>)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, transferred: u64, total: Option<u64>) {
        self.reports.lock().unwrap().push((transferred, total));
    }
}
