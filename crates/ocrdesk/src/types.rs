//! Shared data model for the recognition pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, OcrDeskError};

/// Recognition quality preset.
///
/// Maps to engine selection and preprocessing flags on the remote recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = OcrDeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(OcrDeskError::validation(format!(
                "Invalid quality level '{}', expected one of: low, medium, high",
                other
            ))),
        }
    }
}

/// A single recognition request. Built per call and discarded afterwards.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub image_bytes: Vec<u8>,
    pub language: String,
    pub quality: QualityLevel,
    pub optimize: bool,
    pub use_cache: bool,
}

impl RecognitionRequest {
    pub fn new(image_bytes: Vec<u8>, settings: &BatchSettings) -> Self {
        Self {
            image_bytes,
            language: settings.language.clone(),
            quality: settings.quality,
            optimize: settings.optimize,
            use_cache: settings.use_cache,
        }
    }
}

/// Successful recognition output.
///
/// This is also the value stored in each cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    /// Wall-clock seconds spent on the remote call.
    pub processing_time: f64,
    /// Display name of the language, e.g. "English".
    pub language: String,
    /// Internal language code, e.g. "en".
    pub detected_language: String,
}

/// Failed recognition output for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionError {
    #[serde(rename = "error")]
    pub message: String,
    pub kind: ErrorKind,
}

impl RecognitionError {
    pub fn from_error(err: &OcrDeskError, context: &str) -> Self {
        Self {
            message: format!("{}: {}", context, err),
            kind: err.kind(),
        }
    }
}

/// Exactly one of result or error per processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecognitionOutcome {
    Success(RecognitionResult),
    Failure(RecognitionError),
}

impl RecognitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn result(&self) -> Option<&RecognitionResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RecognitionError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }
}

/// One named input of a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Result slot for one batch item, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub name: String,
    /// Served from the content cache (or shared with an identical item in the same batch).
    pub from_cache: bool,
    #[serde(flatten)]
    pub outcome: RecognitionOutcome,
    /// Set when the text was obtained but persisting it to the cache failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_warning: Option<String>,
}

/// Progress notification emitted after each completed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Per-batch processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub language: String,
    pub quality: QualityLevel,
    pub optimize: bool,
    pub use_cache: bool,
    pub parallel: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            quality: QualityLevel::Medium,
            optimize: true,
            use_cache: true,
            parallel: true,
        }
    }
}

/// One accepted recognition kept in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub language: String,
    pub processing_time: f64,
    /// File name of the stored image, relative to the history directory.
    pub image_file: String,
}

/// RFC 3339 on write; also accepts offset-less timestamps (`T` or space separated), read as UTC.
mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid timestamp '{}'", raw))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Cumulative processing counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub total_success: u64,
    pub total_failed: u64,
    #[serde(alias = "total_size")]
    pub total_bytes: u64,
    #[serde(default)]
    pub cache_hits: u64,
    #[serde(default, with = "lenient_timestamp::option")]
    pub last_processed: Option<DateTime<Utc>>,
}
