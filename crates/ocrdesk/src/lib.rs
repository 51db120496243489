//! ocrdesk - local OCR pipeline backed by a remote recognizer
//!
//! ocrdesk relays images to an OCR.space-style recognition service and keeps
//! everything else local: a content-addressed result cache, an append-only
//! history of accepted results with their images, and cumulative statistics.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ocrdesk::{AppState, BatchItem, OcrDeskConfig};
//!
//! # async fn example() -> ocrdesk::Result<()> {
//! let state = AppState::load(OcrDeskConfig::load(None)?)?;
//! let settings = state.config.processing.batch_settings();
//!
//! let items = vec![BatchItem::new("receipt.jpg", std::fs::read("receipt.jpg")?)];
//! for slot in state.batch_processor().process(items, &settings).await {
//!     if let Some(result) = slot.outcome.result() {
//!         state.history.append(&std::fs::read("receipt.jpg")?, &result.text, &result.detected_language, result.processing_time)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Cache** (`cache`): results keyed by a digest of the original bytes
//! - **OCR** (`ocr`): the `Recognizer` trait, OCR.space client, language table
//! - **Core** (`core`): batch processing, app state, config, optimization
//! - **History** (`history`) and **Stats** (`stats`): durable local state
//! - **Export** (`export`) and **Text** (`text`): pure helpers over recognized text
//! - **API** (`api`, feature `api`): Axum HTTP handlers for presentation layers

#![deny(unsafe_code)]

pub mod cache;
pub mod core;
pub mod error;
pub mod export;
pub mod history;
pub mod ocr;
pub mod stats;
pub mod text;
pub mod types;

#[cfg(feature = "api")]
pub mod api;

pub use error::{ErrorKind, OcrDeskError, Result};
pub use types::*;

pub use cache::{ContentCache, content_hash};
pub use core::batch::{BatchLimits, BatchProcessor};
pub use core::config::OcrDeskConfig;
pub use core::state::AppState;
pub use export::{ExportFormat, export_pdf, export_txt};
pub use history::{HistoryStore, display_to_storage_index};
pub use ocr::{LanguageCatalog, OcrSpaceClient, Recognizer};
pub use stats::StatsTracker;
pub use text::{ComparisonResult, compare_results};
