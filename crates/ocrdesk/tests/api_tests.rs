//! Integration tests for the API module.

#![cfg(feature = "api")]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use tower::ServiceExt;

use ocrdesk::api::{
    BatchResponse, CacheStatsResponse, ErrorResponse, HealthResponse, HistoryDeleteResponse, HistoryEntry,
    InfoResponse, LanguagesResponse, create_router,
};
use ocrdesk::{ComparisonResult, RecognitionResult, StatsSnapshot};

mod helpers;

use helpers::{ScriptedRecognizer, expected_text, test_state};

const BOUNDARY: &str = "----ocrdesk-test-boundary";

enum Part<'a> {
    File(&'a str, &'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn setup() -> (tempfile::TempDir, Arc<ScriptedRecognizer>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = Arc::new(ScriptedRecognizer::new());
    let state = Arc::new(test_state(dir.path(), Arc::clone(&recognizer)));
    (dir, recognizer, create_router(state))
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, _recognizer, app) = setup();

    let (status, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn test_info_and_languages() {
    let (_dir, _recognizer, app) = setup();

    let (status, body) = send(&app, empty_request("GET", "/info")).await;
    assert_eq!(status, StatusCode::OK);
    let info: InfoResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(info.recognizer, "scripted");
    assert_eq!(info.languages.len(), 14);

    let (status, body) = send(&app, empty_request("GET", "/languages")).await;
    assert_eq!(status, StatusCode::OK);
    let languages: LanguagesResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(languages.len(), 14);
    assert_eq!(languages.get("de").map(String::as_str), Some("German"));
}

#[tokio::test]
async fn test_recognize_returns_result() {
    let (_dir, recognizer, app) = setup();

    let request = multipart_request(
        "/recognize",
        &[Part::File("image", "scan.png", b"hello"), Part::Text("language", "fr")],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let result: RecognitionResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(result.text, expected_text(b"hello"));
    assert_eq!(result.detected_language, "fr");
    assert_eq!(result.language, "French");
    assert_eq!(recognizer.calls(), 1);
}

#[tokio::test]
async fn test_recognize_unsupported_language_is_rejected_before_remote_call() {
    let (_dir, recognizer, app) = setup();

    let request = multipart_request(
        "/recognize",
        &[Part::File("image", "scan.png", b"hello"), Part::Text("language", "xx")],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error_type, "UnsupportedLanguage");
    assert_eq!(error.status_code, 400);
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn test_recognize_without_image() {
    let (_dir, _recognizer, app) = setup();

    let (status, _) = send(&app, multipart_request("/recognize", &[Part::Text("language", "en")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recognize_remote_failure_maps_to_bad_gateway() {
    let (_dir, _recognizer, app) = setup();

    let request = multipart_request("/recognize", &[Part::File("image", "x.png", b"fail-now")]);
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error_type, "RemoteError");
    assert!(error.message.contains("quota exceeded"));
}

#[tokio::test]
async fn test_batch_with_history_and_rejections() {
    let (_dir, recognizer, app) = setup();

    let request = multipart_request(
        "/batch",
        &[
            Part::File("files", "one.png", b"one"),
            Part::File("files", "notes.txt", b"not an image"),
            Part::File("files", "two.jpg", b"fail-two"),
            Part::File("files", "three.png", b"three"),
            Part::Text("settings", r#"{"language":"de","parallel":false,"optimize":false}"#),
            Part::Text("save_history", "true"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let batch: BatchResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(batch.results.len(), 3);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].name, "notes.txt");
    assert_eq!(batch.saved_to_history, 2);
    assert!(batch.results[0].outcome.is_success());
    assert!(!batch.results[1].outcome.is_success());
    assert_eq!(batch.results[2].name, "three.png");
    assert_eq!(recognizer.calls(), 3);

    let (status, body) = send(&app, empty_request("GET", "/history")).await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<HistoryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].index, 0);
    assert_eq!(entries[0].text, expected_text(b"three"));
    assert_eq!(entries[1].text, expected_text(b"one"));
    assert_eq!(entries[0].language, "de");
}

#[tokio::test]
async fn test_batch_keeps_text_when_history_write_fails() {
    let (dir, _recognizer, app) = setup();
    std::fs::create_dir_all(dir.path().join("history").join("history.json")).unwrap();

    let request = multipart_request(
        "/batch",
        &[
            Part::File("files", "one.png", b"one"),
            Part::Text("save_history", "true"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let batch: BatchResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(batch.saved_to_history, 0);
    assert_eq!(batch.history_errors.len(), 1);
    assert!(batch.history_errors[0].starts_with("one.png: "));
    assert_eq!(batch.results[0].outcome.result().unwrap().text, expected_text(b"one"));
}

#[tokio::test]
async fn test_batch_over_total_limit_is_rejected() {
    let (_dir, recognizer, app) = setup();

    let chunk = vec![1u8; 900 * 1024];
    let parts: Vec<Part<'_>> = (0..5).map(|_| Part::File("files", "big.png", chunk.as_slice())).collect();
    let (status, body) = send(&app, multipart_request("/batch", &parts)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error_type, "PayloadTooLarge");
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn test_history_edit_image_and_delete() {
    let (_dir, _recognizer, app) = setup();

    let image = b"\x89PNG\r\n\x1a\nfake";
    for text in ["first", "second"] {
        let request = multipart_request(
            "/history",
            &[
                Part::File("image", "page.png", image),
                Part::Text("text", text),
                Part::Text("language", "en"),
                Part::Text("processing_time", "1.5"),
            ],
        );
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, json_request("PUT", "/history/1/text", json!({"text": "first, edited"}))).await;
    assert_eq!(status, StatusCode::OK);
    let entry: HistoryEntry = serde_json::from_slice(&body).unwrap();
    assert_eq!(entry.text, "first, edited");

    let (status, body) = send(&app, empty_request("GET", "/history/0/image")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, image.to_vec());

    let (status, _) = send(&app, json_request("PUT", "/history/9/text", json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, empty_request("DELETE", "/history/0")).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: HistoryDeleteResponse = serde_json::from_slice(&body).unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.item.unwrap().text, "second");

    let (status, body) = send(&app, empty_request("DELETE", "/history/7")).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: HistoryDeleteResponse = serde_json::from_slice(&body).unwrap();
    assert!(!deleted.deleted);

    let (_, body) = send(&app, empty_request("GET", "/history")).await;
    let entries: Vec<HistoryEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "first, edited");

    let (status, _) = send(&app, empty_request("DELETE", "/history")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, empty_request("GET", "/history/0/image")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_date_filter() {
    let (_dir, _recognizer, app) = setup();

    let request = multipart_request(
        "/history",
        &[Part::File("image", "p.png", b"img"), Part::Text("text", "today")],
    );
    send(&app, request).await;

    let (status, body) = send(&app, empty_request("GET", "/history?date=1999-01-01")).await;
    assert_eq!(status, StatusCode::OK);
    let entries: Vec<HistoryEntry> = serde_json::from_slice(&body).unwrap();
    assert!(entries.is_empty());

    let (status, _) = send(&app, empty_request("GET", "/history?date=not-a-date")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_and_reset() {
    let (_dir, _recognizer, app) = setup();

    let request = multipart_request("/recognize", &[Part::File("image", "a.png", b"abc")]);
    send(&app, request).await;

    let (_, body) = send(&app, empty_request("GET", "/stats")).await;
    let stats: StatsSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.total_processed, 1);
    assert_eq!(stats.total_bytes, 3);

    let (status, body) = send(&app, empty_request("DELETE", "/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let stats: StatsSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.total_processed, 0);
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let (_dir, _recognizer, app) = setup();

    let request = multipart_request("/recognize", &[Part::File("image", "a.png", b"cache me")]);
    send(&app, request).await;

    let (status, body) = send(&app, empty_request("GET", "/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let stats: CacheStatsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.total_files, 1);

    let (status, _) = send(&app, empty_request("DELETE", "/cache/clear")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, empty_request("GET", "/cache/stats")).await;
    let stats: CacheStatsResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.total_files, 0);
}

#[tokio::test]
async fn test_export_endpoints() {
    let (_dir, _recognizer, app) = setup();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/export/txt", json!({"text": "Grüße"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"ocr_result.txt\""
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), "Grüße".as_bytes());

    let (status, body) = send(&app, json_request("POST", "/export/pdf", json!({"text": "line one\nline two"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));

    let (status, _) = send(&app, json_request("POST", "/export/docx", json!({"text": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_endpoint() {
    let (_dir, _recognizer, app) = setup();

    let (status, body) = send(
        &app,
        json_request("POST", "/compare", json!({"first": "The cat sat", "second": "the cat ran"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let comparison: ComparisonResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(comparison.common_words, vec!["cat", "the"]);
    assert!((comparison.similarity - 2.0 / 3.0).abs() < 1e-9);
}
