//! Client for OCR.space-compatible recognition endpoints.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::Recognizer;
use super::languages::{display_name, normalize_code, remote_language_code};
use crate::error::{OcrDeskError, Result};
use crate::types::{QualityLevel, RecognitionResult};

pub const DEFAULT_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Payload type tag sent to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Png,
    Jpg,
    Pdf,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpg => "JPG",
            Self::Pdf => "PDF",
        }
    }
}

/// Pick the type tag from magic bytes. Anything that is not JPEG or PDF is sent as PNG.
pub fn detect_file_type(bytes: &[u8]) -> FileType {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        FileType::Jpg
    } else if bytes.starts_with(b"%PDF") {
        FileType::Pdf
    } else {
        FileType::Png
    }
}

/// Engine and preprocessing flags for a quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityParams {
    pub engine: u8,
    pub scale: bool,
    pub detect_orientation: bool,
    pub is_table: bool,
}

impl From<QualityLevel> for QualityParams {
    fn from(quality: QualityLevel) -> Self {
        match quality {
            QualityLevel::Low => Self {
                engine: 1,
                scale: false,
                detect_orientation: false,
                is_table: false,
            },
            QualityLevel::Medium => Self {
                engine: 2,
                scale: true,
                detect_orientation: true,
                is_table: false,
            },
            QualityLevel::High => Self {
                engine: 2,
                scale: true,
                detect_orientation: true,
                is_table: true,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    fn joined(&self) -> String {
        match self {
            Self::One(message) => message.clone(),
            Self::Many(messages) => messages.join("; "),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
}

impl OcrSpaceResponse {
    fn into_text(self) -> Result<String> {
        if self.is_errored_on_processing {
            let message = self
                .error_message
                .map(|m| m.joined())
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "unknown processing error".to_string());
            return Err(OcrDeskError::remote(format!("Recognition failed: {}", message)));
        }

        self.parsed_results
            .and_then(|results| results.into_iter().next())
            .map(|first| first.parsed_text.trim().to_string())
            .ok_or_else(|| OcrDeskError::remote("Recognition returned no results"))
    }
}

/// HTTP client for an OCR.space-style endpoint.
#[derive(Debug, Clone)]
pub struct OcrSpaceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OcrSpaceClient {
    /// # Errors
    ///
    /// `OcrDeskError::Validation` if `api_key` is empty, `OcrDeskError::Remote`
    /// if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(OcrDeskError::validation("OCR API key is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrDeskError::remote_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form_fields(image_bytes: &[u8], remote_language: &str, quality: QualityLevel) -> Vec<(&'static str, String)> {
        let file_type = detect_file_type(image_bytes);
        let params = QualityParams::from(quality);
        let data_uri = format!("data:{};base64,{}", file_type.mime_type(), STANDARD.encode(image_bytes));

        vec![
            ("base64Image", data_uri),
            ("language", remote_language.to_string()),
            ("isOverlayRequired", "false".to_string()),
            ("OCREngine", params.engine.to_string()),
            ("filetype", file_type.tag().to_string()),
            ("detectOrientation", params.detect_orientation.to_string()),
            ("scale", params.scale.to_string()),
            ("isCreateSearchablePdf", "false".to_string()),
            ("isSearchablePdfHideTextLayer", "false".to_string()),
            ("isTable", params.is_table.to_string()),
        ]
    }
}

#[async_trait]
impl Recognizer for OcrSpaceClient {
    async fn recognize(&self, image_bytes: &[u8], language: &str, quality: QualityLevel) -> Result<RecognitionResult> {
        let remote_language = remote_language_code(language)?;
        let code = normalize_code(language)?;
        let language_name = display_name(language)?;

        let form = Self::form_fields(image_bytes, remote_language, quality);
        tracing::debug!(
            endpoint = %self.endpoint,
            bytes = image_bytes.len(),
            language = remote_language,
            quality = %quality,
            "sending recognition request"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(OcrDeskError::remote(format!(
                "Endpoint returned status {}: {}",
                status,
                snippet.trim()
            )));
        }

        let parsed: OcrSpaceResponse = response.json().await?;
        let text = parsed.into_text()?;
        let elapsed = started.elapsed().as_secs_f64();

        Ok(RecognitionResult {
            text,
            processing_time: (elapsed * 100.0).round() / 100.0,
            language: language_name.to_string(),
            detected_language: code.to_string(),
        })
    }

    fn name(&self) -> &str {
        "ocr.space"
    }
}
