//! Download flow tests against an in-process fake asset gateway.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Multipart, Query as UrlQuery};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse as _, Response};
use axum::routing::{get, post};
use axum::{Json, Router, serve};
use futures::future::join_all;
use nearsight_client::{
    AssetRetriever, DirectoryTarget, DownloadState, SaveTarget, StagedBlob,
};
use nearsight_core::{AssetId, Error, FilenameSource, Result};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

const BIKE_BYTES: &[u8] = b"\xff\xd8\xff\xe0 original bicycle";

async fn spawn_gateway(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        serve(listener, router).await.expect("fake gateway crashed");
    });
    format!("http://{addr}")
}

async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    format!("http://{addr}")
}

async fn fetch_raw(UrlQuery(params): UrlQuery<HashMap<String, String>>) -> Response {
    match params.get("id").map(String::as_str) {
        Some("abc123") => (
            [(CONTENT_DISPOSITION, "attachment; filename=bike.jpg")],
            BIKE_BYTES,
        )
            .into_response(),
        Some("quoted") => (
            [(CONTENT_DISPOSITION, "attachment; filename=\"red bike.jpg\"")],
            BIKE_BYTES,
        )
            .into_response(),
        Some("malformed") => ([(CONTENT_DISPOSITION, "attachment")], BIKE_BYTES).into_response(),
        Some("escape") => (
            [(CONTENT_DISPOSITION, "attachment; filename=../../escape.jpg")],
            BIKE_BYTES,
        )
            .into_response(),
        Some("utf8") => {
            let value = HeaderValue::from_bytes("inline; filename=\"café.jpg\"".as_bytes())
                .expect("raw UTF-8 is a valid header value");
            ([(CONTENT_DISPOSITION, value)], BIKE_BYTES).into_response()
        }
        Some("missing") | None => StatusCode::NOT_FOUND.into_response(),
        Some(_) => BIKE_BYTES.into_response(),
    }
}

/// Echoes `<part name>:<byte count>` for every part whose file name matches its name.
async fn upload_raw(mut multipart: Multipart) -> Response {
    let mut ids = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("valid multipart body") {
        let name = field.name().unwrap_or_default().to_owned();
        if field.file_name() != Some(name.as_str()) {
            return StatusCode::BAD_REQUEST.into_response();
        }
        let bytes = field.bytes().await.expect("readable part");
        ids.push(format!("{name}:{}", bytes.len()));
    }
    Json(json!({ "ids": ids })).into_response()
}

fn gateway() -> Router {
    Router::new()
        .route("/fetch_raw", get(fetch_raw))
        .route("/upload_raw", post(upload_raw))
}

async fn retriever() -> AssetRetriever {
    let base = spawn_gateway(gateway()).await;
    AssetRetriever::new(&base).expect("valid retriever")
}

/// Save target that remembers which staged file it was handed.
#[derive(Default)]
struct RecordingTarget {
    inner: Option<DirectoryTarget>,
    staged: Mutex<Vec<PathBuf>>,
}

impl RecordingTarget {
    fn saving_into(dir: &TempDir) -> Self {
        Self {
            inner: Some(DirectoryTarget::new(dir.path())),
            staged: Mutex::default(),
        }
    }

    fn failing() -> Self {
        Self::default()
    }

    fn staged(&self) -> Vec<PathBuf> {
        self.staged.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SaveTarget for RecordingTarget {
    async fn save(&self, blob: &StagedBlob, filename: &str) -> Result<PathBuf> {
        assert!(blob.path().exists(), "blob must exist while saving");
        self.staged
            .lock()
            .expect("lock")
            .push(blob.path().to_path_buf());
        match &self.inner {
            Some(target) => target.save(blob, filename).await,
            None => Err(Error::Other("save dialog dismissed".to_owned())),
        }
    }
}

#[tokio::test]
async fn test_fetch_original_uses_header_filename() {
    let artifact = retriever()
        .await
        .fetch_original(&AssetId::new("abc123"))
        .await
        .expect("fetch should succeed");

    assert_eq!(artifact.filename, "bike.jpg");
    assert_eq!(artifact.filename_source, FilenameSource::Header);
    assert_eq!(artifact.bytes, BIKE_BYTES);
}

#[tokio::test]
async fn test_fetch_original_without_header_uses_fallback() {
    let artifact = retriever()
        .await
        .fetch_original(&AssetId::new("def456"))
        .await
        .expect("fetch should succeed");

    assert_eq!(artifact.filename, "def456.bin");
    assert_eq!(artifact.filename_source, FilenameSource::Fallback);
    assert_eq!(artifact.bytes, BIKE_BYTES);
}

#[tokio::test]
async fn test_fetch_original_malformed_header_uses_fallback() {
    let artifact = retriever()
        .await
        .fetch_original(&AssetId::new("malformed"))
        .await
        .expect("malformed header must not fail the download");

    assert_eq!(artifact.filename, "malformed.bin");
    assert_eq!(artifact.filename_source, FilenameSource::Fallback);
}

#[tokio::test]
async fn test_fetch_original_strips_quotes() {
    let artifact = retriever()
        .await
        .fetch_original(&AssetId::new("quoted"))
        .await
        .expect("fetch should succeed");
    assert_eq!(artifact.filename, "red bike.jpg");
}

#[tokio::test]
async fn test_not_found_is_backend_error() {
    let result = retriever()
        .await
        .fetch_original(&AssetId::new("missing"))
        .await;
    assert!(matches!(result, Err(Error::Backend(ref msg)) if msg.contains("404")));
}

#[tokio::test]
async fn test_unreachable_gateway_is_network_error() {
    let retriever = AssetRetriever::new(&dead_url().await).expect("valid retriever");
    let out = TempDir::new().expect("Failed to create temp dir");
    let target = RecordingTarget::saving_into(&out);

    let result = retriever
        .download_original(&AssetId::new("abc123"), &target)
        .await;

    assert!(matches!(result, Err(Error::Network(_))));
    assert!(target.staged().is_empty(), "nothing staged before fetch succeeds");
}

#[tokio::test]
async fn test_download_saves_and_releases() {
    let out = TempDir::new().expect("Failed to create temp dir");
    let target = RecordingTarget::saving_into(&out);

    let report = retriever()
        .await
        .download_original(&AssetId::new("abc123"), &target)
        .await
        .expect("download should succeed");

    assert_eq!(report.saved_to, out.path().join("bike.jpg"));
    assert_eq!(fs::read(&report.saved_to).expect("saved file"), BIKE_BYTES);
    assert_eq!(
        report.transitions,
        [
            DownloadState::Idle,
            DownloadState::Fetching,
            DownloadState::Parsing,
            DownloadState::Saving,
            DownloadState::Released,
        ]
    );

    let staged = target.staged();
    assert_eq!(staged.len(), 1);
    assert!(!staged[0].exists(), "staged blob must be released");
}

#[tokio::test]
async fn test_download_releases_when_save_fails() {
    let target = RecordingTarget::failing();

    let result = retriever()
        .await
        .download_original(&AssetId::new("abc123"), &target)
        .await;

    assert!(matches!(result, Err(Error::Other(ref msg)) if msg.contains("dismissed")));
    let staged = target.staged();
    assert_eq!(staged.len(), 1);
    assert!(!staged[0].exists(), "staged blob must be released after a failed save");
}

#[tokio::test]
async fn test_download_keeps_server_name_inside_output_dir() {
    let out = TempDir::new().expect("Failed to create temp dir");
    let target = DirectoryTarget::new(out.path());

    let report = retriever()
        .await
        .download_original(&AssetId::new("escape"), &target)
        .await
        .expect("download should succeed");

    assert_eq!(report.saved_to, out.path().join("escape.jpg"));
}

#[tokio::test]
async fn test_repeated_downloads_stage_separately() {
    let retriever = Arc::new(retriever().await);
    let out = TempDir::new().expect("Failed to create temp dir");
    let target = Arc::new(RecordingTarget::saving_into(&out));

    let downloads = ["one", "two", "three"].map(|id| {
        let retriever = Arc::clone(&retriever);
        let target = Arc::clone(&target);
        async move {
            retriever
                .download_original(&AssetId::new(id), target.as_ref())
                .await
        }
    });

    let reports = join_all(downloads).await;
    assert!(reports.iter().all(|report| report.is_ok()));

    let mut staged = target.staged();
    assert_eq!(staged.len(), 3);
    staged.sort();
    staged.dedup();
    assert_eq!(staged.len(), 3, "each download owns its own blob");
    assert!(staged.iter().all(|path| !path.exists()));

    for id in ["one", "two", "three"] {
        assert!(out.path().join(format!("{id}.bin")).exists());
    }
}

#[tokio::test]
async fn test_fetch_original_decodes_utf8_header_filename() {
    let artifact = retriever()
        .await
        .fetch_original(&AssetId::new("utf8"))
        .await
        .expect("fetch should succeed");

    assert_eq!(artifact.filename, "café.jpg");
    assert_eq!(artifact.filename_source, FilenameSource::Header);
}

#[tokio::test]
async fn test_downloading_twice_keeps_both_copies() {
    let retriever = retriever().await;
    let out = TempDir::new().expect("Failed to create temp dir");
    let target = DirectoryTarget::new(out.path());
    let id = AssetId::new("abc123");

    let first = retriever
        .download_original(&id, &target)
        .await
        .expect("first download should succeed");
    let second = retriever
        .download_original(&id, &target)
        .await
        .expect("second download should succeed");

    assert_eq!(first.saved_to, out.path().join("bike.jpg"));
    assert_eq!(second.saved_to, out.path().join("bike (1).jpg"));
    assert_eq!(fs::read(&second.saved_to).expect("saved file"), BIKE_BYTES);
}

#[tokio::test]
async fn test_upload_sends_one_part_per_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("b.jpg"), b"bee").expect("writable");
    fs::write(dir.path().join("a.jpg"), b"ay").expect("writable");

    let ids = retriever()
        .await
        .upload(&[dir.path().to_path_buf()])
        .await
        .expect("upload should succeed");

    assert_eq!(ids, [AssetId::new("a.jpg:2"), AssetId::new("b.jpg:3")]);
}

#[tokio::test]
async fn test_upload_error_status_is_backend_error() {
    let router = Router::new().route(
        "/upload_raw",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let retriever = AssetRetriever::new(&spawn_gateway(router).await).expect("valid retriever");
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = dir.path().join("a.jpg");
    fs::write(&file, b"ay").expect("writable");

    let result = retriever.upload(&[file]).await;
    assert!(matches!(result, Err(Error::Backend(ref msg)) if msg.contains("500")));
}

#[tokio::test]
async fn test_upload_malformed_response_is_backend_error() {
    let router = Router::new().route("/upload_raw", post(|| async { "uploaded" }));
    let retriever = AssetRetriever::new(&spawn_gateway(router).await).expect("valid retriever");
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = dir.path().join("a.jpg");
    fs::write(&file, b"ay").expect("writable");

    let result = retriever.upload(&[file]).await;
    assert!(matches!(result, Err(Error::Backend(ref msg)) if msg.contains("malformed")));
}

#[tokio::test]
async fn test_upload_of_empty_directory_sends_nothing() {
    let retriever = AssetRetriever::new(&dead_url().await).expect("valid retriever");
    let dir = TempDir::new().expect("Failed to create temp dir");

    let result = retriever.upload(&[dir.path().to_path_buf()]).await;
    assert!(matches!(result, Err(Error::Other(ref msg)) if msg.contains("no files")));
}
