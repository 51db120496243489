//! Error types for ocrdesk.
//!
//! Every fallible operation in the library returns [`OcrDeskError`]. The
//! variants follow the pipeline's failure taxonomy:
//!
//! - `UnsupportedLanguage` - bad input, raised before any network call
//! - `PayloadTooLarge` - local size validation
//! - `Remote` - recognition endpoint unreachable, timed out, non-success
//!   status or an error reported by the endpoint itself
//! - `Storage` - local file I/O while persisting cache, history or stats
//! - `CorruptState` - unreadable on-disk history or stats. Stores recover
//!   from it by resetting to an empty/zeroed state; it is only surfaced
//!   when a caller asks for a strict load.
//!
//! `Io` is reserved for reading user-supplied input files and bubbles up
//! unchanged.
//!
//! # Example
//!
//! ```rust
//! use ocrdesk::{OcrDeskError, Result};
//!
//! fn check_size(len: usize, limit: usize) -> Result<()> {
//!     if len > limit {
//!         return Err(OcrDeskError::PayloadTooLarge { size: len, limit });
//!     }
//!     Ok(())
//! }
//! # assert!(check_size(10, 5).is_err());
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `OcrDeskError`.
pub type Result<T> = std::result::Result<T, OcrDeskError>;

/// Main error type for all ocrdesk operations.
#[derive(Debug, Error)]
pub enum OcrDeskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Payload too large: {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Remote error: {message}")]
    Remote {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Corrupt state: {message}")]
    CorruptState {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cancelled before processing started")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an error, carried inside per-item batch results
/// so presentation layers can pick a status without the original error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    PayloadTooLarge,
    Remote,
    Storage,
    CorruptState,
    Validation,
    ImageProcessing,
    Cancelled,
    Internal,
}

impl From<serde_json::Error> for OcrDeskError {
    fn from(err: serde_json::Error) -> Self {
        OcrDeskError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for OcrDeskError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if err.is_connect() {
            format!("endpoint unreachable: {}", err)
        } else {
            err.to_string()
        };
        OcrDeskError::Remote {
            message,
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl OcrDeskError {
    error_constructor!(remote, Remote);
    error_constructor!(storage, Storage);
    error_constructor!(corrupt_state, CorruptState);
    error_constructor!(validation, Validation);
    error_constructor!(image_processing, ImageProcessing);
    error_constructor!(serialization, Serialization);

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::CorruptState { .. } => ErrorKind::CorruptState,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ImageProcessing { .. } => ErrorKind::ImageProcessing,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) | Self::Serialization { .. } | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OcrDeskError = io_err.into();
        assert!(matches!(err, OcrDeskError::Io(_)));
        assert!(err.to_string().contains("IO error"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_unsupported_language() {
        let err = OcrDeskError::UnsupportedLanguage("xx".to_string());
        assert_eq!(err.to_string(), "Unsupported language: xx");
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    }

    #[test]
    fn test_payload_too_large() {
        let err = OcrDeskError::PayloadTooLarge { size: 11, limit: 10 };
        assert_eq!(
            err.to_string(),
            "Payload too large: 11 bytes exceeds the limit of 10 bytes"
        );
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn test_remote_error_with_source() {
        let source = std::io::Error::other("connection reset");
        let err = OcrDeskError::remote_with_source("endpoint failed", source);
        assert_eq!(err.to_string(), "Remote error: endpoint failed");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[test]
    fn test_storage_error() {
        let err = OcrDeskError::storage("disk full");
        assert_eq!(err.to_string(), "Storage error: disk full");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_corrupt_state_error() {
        let err = OcrDeskError::corrupt_state("history.json is not an array");
        assert_eq!(err.to_string(), "Corrupt state: history.json is not an array");
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: OcrDeskError = json_err.into();
        assert!(matches!(err, OcrDeskError::Serialization { .. }));
    }

    #[test]
    fn test_cancelled() {
        assert_eq!(OcrDeskError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PayloadTooLarge).unwrap();
        assert_eq!(json, "\"payload_too_large\"");
    }
}
