//! API request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::state::AppState;
use crate::core::validation::RejectedUpload;
use crate::types::{BatchItemResult, HistoryItem};

/// API server size limit configuration.
///
/// Controls the maximum request body size. Defaults to 100 MB, which covers
/// a full batch of images at the default per-file limit.
///
/// Override with `OCRDESK_MAX_UPLOAD_SIZE_MB`.
///
/// # Examples
///
/// ```
/// use ocrdesk::api::ApiSizeLimits;
///
/// let limits = ApiSizeLimits::default();
/// assert_eq!(limits.max_request_body_bytes, 100 * 1024 * 1024);
///
/// let limits = ApiSizeLimits::from_mb(20);
/// assert_eq!(limits.max_request_body_bytes, 20 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ApiSizeLimits {
    pub max_request_body_bytes: usize,
}

impl Default for ApiSizeLimits {
    fn default() -> Self {
        Self::from_mb(100)
    }
}

impl ApiSizeLimits {
    pub fn new(max_request_body_bytes: usize) -> Self {
        Self { max_request_body_bytes }
    }

    pub fn from_mb(max_request_body_mb: usize) -> Self {
        Self {
            max_request_body_bytes: max_request_body_mb * 1024 * 1024,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server information response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub version: String,
    /// Recognition endpoint the server relays to
    pub endpoint: String,
    pub recognizer: String,
    /// Supported language codes
    pub languages: Vec<String>,
}

/// Language code to display name.
pub type LanguagesResponse = BTreeMap<String, String>;

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type name
    pub error_type: String,
    pub message: String,
    pub status_code: u16,
}

/// Result of `POST /batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// One slot per accepted upload, in upload order.
    pub results: Vec<BatchItemResult>,
    /// Uploads skipped by validation.
    pub rejected: Vec<RejectedUpload>,
    /// Successful results appended to history (`save_history=true`).
    pub saved_to_history: usize,
    /// History appends that failed; the recognized text is still in `results`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history_errors: Vec<String>,
}

/// `GET /history` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub date: Option<NaiveDate>,
}

/// A history item with its newest-first display index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub language: String,
    pub processing_time: f64,
    pub image_file: String,
}

impl HistoryEntry {
    pub fn new(index: usize, item: HistoryItem) -> Self {
        Self {
            index,
            timestamp: item.timestamp,
            text: item.text,
            language: item.language,
            processing_time: item.processing_time,
            image_file: item.image_file,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDeleteResponse {
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<HistoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryClearResponse {
    pub removed_items: usize,
}

/// Cache statistics response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub directory: String,
    pub total_files: usize,
    pub total_size_mb: f64,
}

/// Cache clear response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub directory: String,
    pub removed_files: usize,
    pub freed_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareRequest {
    pub first: String,
    pub second: String,
}

/// API server state.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub app: Arc<AppState>,
}
