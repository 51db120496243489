//! OCR.space client against a local mock endpoint.

#![cfg(feature = "api")]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use parking_lot::Mutex;
use serde_json::json;

use ocrdesk::{ErrorKind, OcrDeskError, OcrSpaceClient, QualityLevel, Recognizer};

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
}

impl Captured {
    fn len(&self) -> usize {
        self.requests.lock().len()
    }

    fn last(&self) -> (Option<String>, HashMap<String, String>) {
        self.requests.lock().last().cloned().unwrap()
    }
}

/// Responds according to the requested remote language code.
async fn mock_parse(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let api_key = headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let language = form.get("language").cloned().unwrap_or_default();
    captured.requests.lock().push((api_key, form));

    match language.as_str() {
        "eng" | "ger" => Json(json!({
            "ParsedResults": [{ "ParsedText": "  Hello world \r\n" }],
            "IsErroredOnProcessing": false
        }))
        .into_response(),
        "rus" => Json(json!({
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["Unable to recognize the file type", "E216"]
        }))
        .into_response(),
        "fre" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "jpn" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "ParsedResults": [], "IsErroredOnProcessing": false })).into_response()
        }
        _ => Json(json!({ "ParsedResults": [], "IsErroredOnProcessing": false })).into_response(),
    }
}

async fn start_mock() -> (SocketAddr, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/parse/image", post(mock_parse))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, captured)
}

fn client(addr: SocketAddr, timeout: Duration) -> OcrSpaceClient {
    OcrSpaceClient::new(format!("http://{}/parse/image", addr), "test-key", timeout).unwrap()
}

fn assert_remote(err: &OcrDeskError, needle: &str) {
    assert_eq!(err.kind(), ErrorKind::Remote, "{err}");
    assert!(err.to_string().contains(needle), "{err} should mention {needle:?}");
}

#[tokio::test]
async fn test_successful_recognition() {
    let (addr, captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    let result = client
        .recognize(b"\x89PNG\r\n\x1a\nbody", "de", QualityLevel::Medium)
        .await
        .unwrap();

    assert_eq!(result.text, "Hello world");
    assert_eq!(result.language, "German");
    assert_eq!(result.detected_language, "de");
    assert!(result.processing_time >= 0.0);

    let (api_key, form) = captured.last();
    assert_eq!(api_key.as_deref(), Some("test-key"));
    assert_eq!(form["language"], "ger");
    assert_eq!(form["filetype"], "PNG");
    assert_eq!(form["OCREngine"], "2");
    assert_eq!(form["scale"], "true");
    assert_eq!(form["detectOrientation"], "true");
    assert_eq!(form["isOverlayRequired"], "false");
    assert!(form["base64Image"].starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_low_quality_and_jpeg_tag() {
    let (addr, captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    client
        .recognize(&[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3], "en", QualityLevel::Low)
        .await
        .unwrap();

    let (_, form) = captured.last();
    assert_eq!(form["filetype"], "JPG");
    assert_eq!(form["OCREngine"], "1");
    assert_eq!(form["scale"], "false");
    assert!(form["base64Image"].starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_unsupported_language_makes_no_request() {
    let (addr, captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    let err = client.recognize(b"img", "klingon", QualityLevel::Medium).await.unwrap_err();
    assert!(matches!(err, OcrDeskError::UnsupportedLanguage(ref code) if code == "klingon"));
    assert_eq!(captured.len(), 0);
}

#[tokio::test]
async fn test_processing_error_is_remote_error() {
    let (addr, _captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    let err = client.recognize(b"img", "ru", QualityLevel::Medium).await.unwrap_err();
    assert_remote(&err, "Unable to recognize the file type; E216");
}

#[tokio::test]
async fn test_error_status_is_remote_error() {
    let (addr, _captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    let err = client.recognize(b"img", "fr", QualityLevel::Medium).await.unwrap_err();
    assert_remote(&err, "500");
    assert_remote(&err, "upstream exploded");
}

#[tokio::test]
async fn test_empty_results_are_remote_error() {
    let (addr, _captured) = start_mock().await;
    let client = client(addr, Duration::from_secs(5));

    let err = client.recognize(b"img", "es", QualityLevel::Medium).await.unwrap_err();
    assert_remote(&err, "no results");
}

#[tokio::test]
async fn test_timeout_is_remote_error() {
    let (addr, _captured) = start_mock().await;
    let client = client(addr, Duration::from_millis(200));

    let err = client.recognize(b"img", "ja", QualityLevel::Medium).await.unwrap_err();
    assert_remote(&err, "timed out");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_remote_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(addr, Duration::from_secs(2));
    let err = client.recognize(b"img", "en", QualityLevel::Medium).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
}

#[test]
fn test_empty_api_key_is_rejected() {
    let err = OcrSpaceClient::new("http://127.0.0.1:1/parse/image", "  ", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, OcrDeskError::Validation { .. }));
}
