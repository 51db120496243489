//! Remote recognition.
//!
//! The pipeline talks to OCR through the [`Recognizer`] trait. The shipped
//! implementation is [`OcrSpaceClient`], a client for OCR.space-compatible
//! HTTP endpoints. Tests and embedders can plug in their own recognizer.
//!
//! A recognizer only performs the remote call. Caching, history and stats
//! are the caller's responsibility.

pub mod client;
pub mod languages;

use async_trait::async_trait;

use crate::Result;
use crate::types::{QualityLevel, RecognitionResult};

pub use client::{FileType, OcrSpaceClient, QualityParams, detect_file_type};
pub use languages::{BUILTIN_LANGUAGES, CatalogSource, LanguageCatalog, LanguageSpec, is_supported, remote_language_code};

/// Sends one image to a recognition service.
///
/// # Errors
///
/// - `OcrDeskError::UnsupportedLanguage` - unknown language code, raised before any I/O
/// - `OcrDeskError::Remote` - endpoint unreachable, timed out, non-success status,
///   or the service reported a processing error
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize text in `image_bytes`.
    ///
    /// The returned result carries the wall-clock time of the call.
    async fn recognize(&self, image_bytes: &[u8], language: &str, quality: QualityLevel) -> Result<RecognitionResult>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
