//! Download integration tests

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, ResponseTemplate};

use nimbus_core::ports::{IRemoteTransport, NoProgress};
use nimbus_dav::{DavClient, DavTransport};

use crate::common::{remote, setup_dav_mock, url_path, RecordingProgress, PASSWORD, USER};

#[tokio::test]
async fn test_download_writes_content_and_headers() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("GET"))
        .and(path(url_path("notes.txt")))
        .and(basic_auth(USER, PASSWORD))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"hello world".to_vec())
                .insert_header("OC-ETag", "\"abc\"")
                .insert_header("Last-Modified", "Sat, 17 Oct 2026 20:00:00 GMT"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let destination = dir.path().join("R1").join("notes.txt.partial");
    let progress = RecordingProgress::default();

    let response = transport
        .download(&remote("notes.txt"), &destination, &progress)
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.bytes, 11);
    assert_eq!(response.version_token.unwrap().as_str(), "abc");
    assert_eq!(
        response.last_modified.unwrap(),
        Utc.with_ymd_and_hms(2026, 10, 17, 20, 0, 0).unwrap()
    );
    assert_eq!(std::fs::read(&destination).unwrap(), b"hello world");

    let reports = progress.reports();
    assert_eq!(reports.last(), Some(&(11, Some(11))));
    assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_download_plain_etag_fallback() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("GET"))
        .and(path(url_path("a.bin")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1u8, 2, 3])
                .insert_header("ETag", "W/\"v7\""),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let destination = dir.path().join("a.bin");
    let response = transport
        .download(&remote("a.bin"), &destination, &NoProgress)
        .await
        .unwrap();

    assert_eq!(response.version_token.unwrap().as_str(), "v7");
}

#[tokio::test]
async fn test_download_not_found_leaves_nothing_on_disk() {
    let (server, transport) = setup_dav_mock().await;

    Mock::given(method("GET"))
        .and(path(url_path("missing.txt")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let destination = dir.path().join("missing.txt.partial");
    let response = transport
        .download(&remote("missing.txt"), &destination, &NoProgress)
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.bytes, 0);
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_download_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DavClient::with_base_url(&format!("http://{addr}"), USER, PASSWORD).unwrap();
    let transport = DavTransport::new(client);

    let dir = tempdir().unwrap();
    let err = transport
        .download(&remote("x.txt"), &dir.path().join("x"), &NoProgress)
        .await
        .unwrap_err();

    assert!(err.is_unreachable(), "unexpected error kind: {:?}", err.kind);
}
