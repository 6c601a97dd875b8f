//! Upload integration tests

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use wiremock::matchers::{basic_auth, body_bytes, method, path};
use wiremock::{Mock, ResponseTemplate};

use nimbus_core::ports::{IRemoteTransport, NoProgress, TransportErrorKind};

use crate::common::{remote, setup_dav_mock, url_path, RecordingProgress, PASSWORD, USER};

#[tokio::test]
async fn test_upload_returns_file_id_and_token() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("PUT"))
        .and(path(url_path("photo.jpg")))
        .and(basic_auth(USER, PASSWORD))
        .and(body_bytes(b"jpeg-bytes".to_vec()))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("OC-FileId", "00000042ocxyz")
                .insert_header("OC-ETag", "\"abc\"")
                .insert_header("Date", "Sun, 18 Oct 2026 09:15:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("photo.jpg");
    std::fs::write(&source, b"jpeg-bytes").unwrap();
    let progress = RecordingProgress::default();

    let response = transport
        .upload(&remote("photo.jpg"), &source, &progress)
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.file_id.unwrap().as_str(), "00000042ocxyz");
    assert_eq!(response.version_token.unwrap().as_str(), "abc");
    assert_eq!(
        response.date.unwrap(),
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 0).unwrap()
    );
    assert_eq!(response.bytes, 10);

    for (sent, total) in progress.reports() {
        assert_eq!(total, Some(10));
        assert!(sent <= 10);
    }
}

#[tokio::test]
async fn test_upload_without_file_id_header() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("PUT"))
        .and(path(url_path("a.txt")))
        .respond_with(ResponseTemplate::new(204).insert_header("ETag", "\"v2\""))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("a.txt");
    std::fs::write(&source, b"x").unwrap();

    let response = transport
        .upload(&remote("a.txt"), &source, &NoProgress)
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(response.file_id.is_none());
    assert_eq!(response.version_token.unwrap().as_str(), "v2");
}

#[tokio::test]
async fn test_upload_locked_is_reported_as_status() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("PUT"))
        .and(path(url_path("locked.txt")))
        .respond_with(ResponseTemplate::new(423))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("locked.txt");
    std::fs::write(&source, b"data").unwrap();

    let response = transport
        .upload(&remote("locked.txt"), &source, &NoProgress)
        .await
        .unwrap();

    assert_eq!(response.status, 423);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_upload_missing_source_is_io_error() {
    let (_server, transport) = setup_dav_mock().await;
    let dir = tempdir().unwrap();

    let err = transport
        .upload(&remote("gone.txt"), &dir.path().join("gone.txt"), &NoProgress)
        .await
        .unwrap_err();

    assert_eq!(err.kind, TransportErrorKind::Io);
    assert!(!err.is_unreachable());
}
