//! Upload client against a live server

use cfp_storage::client::{AbortSignal, UploadClient, UploadError, UploadProgress, UploadRequest};
use cfp_storage::http::router;
use cfp_storage::storage::{ErrorCode, FilesystemStorage, ResourceKind, StorageProvider, UrlResolver};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

async fn spawn_server() -> (TempDir, Arc<FilesystemStorage>, String) {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStorage::new(temp.path(), UrlResolver::default()).unwrap());
    let app = router(storage.clone(), 16 * 1024 * 1024);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (temp, storage, format!("http://{addr}"))
}

fn recorder() -> (Arc<Mutex<Vec<UploadProgress>>>, impl FnMut(UploadProgress) + Send + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |p| sink.lock().unwrap().push(p))
}

#[tokio::test]
async fn upload_reports_monotonic_progress() {
    let (_temp, storage, base) = spawn_server().await;
    let client = UploadClient::new(base).with_chunk_size(1024);

    let mut data = PNG_MAGIC.to_vec();
    data.resize(10 * 1024 + 17, 7);
    let request = UploadRequest::new(ResourceKind::EventBanner, "banner.png", data.clone())
        .with_target_id("conf-2026")
        .with_content_type("image/png");

    let (events, on_progress) = recorder();
    let stored = client.upload(request, on_progress, None).await.unwrap();

    assert_eq!(stored.path, "events/conf-2026/banner");
    assert_eq!(stored.size, data.len() as u64);
    assert_eq!(storage.download(&stored.path).await.unwrap(), data);

    let events = events.lock().unwrap();
    assert!(events.len() >= 2);
    assert!(events
        .windows(2)
        .all(|w| w[0].loaded <= w[1].loaded && w[0].percentage <= w[1].percentage));
    let last = events.last().unwrap();
    assert_eq!(last.loaded, data.len() as u64);
    assert_eq!(last.total, data.len() as u64);
    assert_eq!(last.percentage, 100);
}

#[tokio::test]
async fn empty_upload_reports_single_terminal_event() {
    let (_temp, _storage, base) = spawn_server().await;
    let client = UploadClient::new(base);

    let request = UploadRequest::new(ResourceKind::Temp, "empty.pdf", Vec::new())
        .with_content_type("application/pdf");
    let (events, on_progress) = recorder();
    let stored = client.upload(request, on_progress, None).await.unwrap();

    assert_eq!(stored.size, 0);
    assert_eq!(*events.lock().unwrap(), vec![UploadProgress::new(0, 0)]);
    assert_eq!(events.lock().unwrap()[0].percentage, 100);
}

#[tokio::test]
async fn rejection_carries_error_code() {
    let (_temp, _storage, base) = spawn_server().await;
    let client = UploadClient::new(base);

    let request = UploadRequest::new(ResourceKind::Avatar, "page.html", b"<html>".to_vec())
        .with_target_id("u1")
        .with_content_type("text/html");
    let err = client.upload(request, |_| {}, None).await.unwrap_err();

    match err {
        UploadError::Rejected { status, code, .. } => {
            assert_eq!(status.as_u16(), 415);
            assert_eq!(code, Some(ErrorCode::TypeNotAllowed));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = UploadClient::new(format!("http://{addr}"));
    let request = UploadRequest::new(ResourceKind::Temp, "a.pdf", b"%PDF".to_vec());
    let err = client.upload(request, |_| {}, None).await.unwrap_err();

    assert!(matches!(err, UploadError::Network(_)));
    assert!(matches!(
        client.delete("temp/x").await,
        Err(UploadError::Network(_))
    ));
}

#[tokio::test]
async fn abort_during_upload() {
    let (_temp, _storage, base) = spawn_server().await;
    let client = UploadClient::new(base).with_chunk_size(64);
    let signal = AbortSignal::new();

    // Fire on the first progress report so the request is in flight
    let trigger = signal.clone();
    let request = UploadRequest::new(ResourceKind::Temp, "a.pdf", vec![0; 256 * 1024])
        .with_content_type("application/pdf");
    let err = client
        .upload(request, move |_| trigger.abort(), Some(&signal))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Aborted));
}

#[tokio::test]
async fn delete_reports_boolean() {
    let (_temp, storage, base) = spawn_server().await;
    let client = UploadClient::new(base);

    let request = UploadRequest::new(ResourceKind::SubmissionMaterial, "talk.pdf", b"%PDF".to_vec())
        .with_target_id("s1")
        .with_content_type("application/pdf");
    let stored = client.upload(request, |_| {}, None).await.unwrap();

    assert!(client.delete(&stored.path).await.unwrap());
    assert!(!storage.exists(&stored.path).await.unwrap());
    assert!(!client.delete(&stored.path).await.unwrap());
}

#[tokio::test]
async fn undecodable_success_body_is_not_a_network_error() {
    // Answers 200 with a body that is not the upload JSON
    async fn garbled(_body: axum::body::Bytes) -> &'static str {
        "<html>maintenance</html>"
    }
    let app = axum::Router::new().route(
        cfp_storage::http::UPLOAD_ROUTE,
        axum::routing::post(garbled).delete(garbled),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = UploadClient::new(format!("http://{addr}"));
    let request = UploadRequest::new(ResourceKind::Temp, "a.pdf", b"%PDF".to_vec())
        .with_content_type("application/pdf");
    let err = client.upload(request, |_| {}, None).await.unwrap_err();

    match err {
        UploadError::InvalidResponse { status, .. } => assert_eq!(status, 200),
        other => panic!("expected undecodable response, got {other:?}"),
    }
    assert!(matches!(
        client.delete("temp/x").await,
        Err(UploadError::InvalidResponse { .. })
    ));
}
