//! Core pipeline orchestration.
//!
//! - **Batch**: ordered, failure-isolated processing with cache short-circuit
//! - **State**: the application state struct shared by presentation layers
//! - **Configuration**: loading and validating `ocrdesk.toml`
//! - **Optimization**: downscale/re-encode of payloads sent to the recognizer
//! - **Validation**: upload checks run before a batch starts
//! - **I/O**: atomic file writes and input reading
//!
//! # Example
//!
//! ```rust,no_run
//! use ocrdesk::core::config::OcrDeskConfig;
//! use ocrdesk::core::state::AppState;
//! use ocrdesk::types::BatchItem;
//!
//! # async fn example() -> ocrdesk::Result<()> {
//! let config = OcrDeskConfig::load(None)?;
//! let state = AppState::load(config)?;
//! let settings = state.config.processing.batch_settings();
//!
//! let bytes = std::fs::read("scan.png")?;
//! let results = state
//!     .batch_processor()
//!     .process(vec![BatchItem::new("scan.png", bytes)], &settings)
//!     .await;
//! println!("{:?}", results[0].outcome);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod io;
pub mod optimize;
pub mod state;
pub mod validation;

pub use batch::{BatchLimits, BatchProcessor, ProgressCallback};
pub use config::{OcrDeskConfig, OcrSettings, ProcessingSettings, StorageSettings};
pub use optimize::{OptimizeOptions, optimize_image};
pub use state::AppState;
pub use validation::{RejectedUpload, UploadValidation, is_allowed_file, validate_upload};
