//! Integration tests for nimbus-dav
//!
//! Uses wiremock to simulate a WebDAV server and verifies end-to-end
//! behavior of downloads, uploads and header extraction.

mod common;

mod test_download;
mod test_upload;
