//! Process-wide application state.
//!
//! [`AppState`] owns the cache, history and stats handles and the
//! recognizer. It is built once at startup with [`AppState::load`] and
//! passed by reference (or `Arc`) to every presentation layer.

use std::sync::Arc;

use crate::cache::{ContentCache, LruByMtime, NoEviction};
use crate::core::batch::{BatchLimits, BatchProcessor};
use crate::core::config::OcrDeskConfig;
use crate::core::io::ensure_dir;
use crate::error::{OcrDeskError, Result};
use crate::history::HistoryStore;
use crate::ocr::{OcrSpaceClient, Recognizer};
use crate::stats::StatsTracker;

pub struct AppState {
    pub config: OcrDeskConfig,
    pub cache: Arc<ContentCache>,
    pub history: Arc<HistoryStore>,
    pub stats: Arc<StatsTracker>,
    pub recognizer: Arc<dyn Recognizer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("data_dir", &self.config.storage.data_dir)
            .field("recognizer", &self.recognizer.name())
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl AppState {
    /// Open storage under the configured data directory and build an OCR.space client.
    ///
    /// # Errors
    ///
    /// `OcrDeskError::Validation` if no API key is configured or found in
    /// the environment, `OcrDeskError::Storage` if the data directory
    /// cannot be created.
    pub fn load(config: OcrDeskConfig) -> Result<Self> {
        let api_key = config.ocr.resolve_api_key().ok_or_else(|| {
            OcrDeskError::validation(
                "No OCR API key configured. Set ocr.api_key in ocrdesk.toml or the OCRDESK_API_KEY environment variable",
            )
        })?;
        let client = OcrSpaceClient::new(config.ocr.endpoint.clone(), api_key, config.ocr.timeout())?;
        Self::with_recognizer(config, Arc::new(client))
    }

    /// Open storage with a caller-supplied recognizer.
    pub fn with_recognizer(config: OcrDeskConfig, recognizer: Arc<dyn Recognizer>) -> Result<Self> {
        config.validate()?;
        let storage = &config.storage;
        ensure_dir(&storage.data_dir)?;

        let cache = match storage.cache_max_entries {
            Some(max_entries) => ContentCache::with_eviction(storage.cache_dir(), Box::new(LruByMtime::new(max_entries)))?,
            None => ContentCache::with_eviction(storage.cache_dir(), Box::new(NoEviction))?,
        };
        let history = HistoryStore::open(storage.history_dir())?;
        let stats = StatsTracker::open(storage.stats_path());

        tracing::info!(
            data_dir = %storage.data_dir.display(),
            recognizer = recognizer.name(),
            eviction = cache.eviction_policy().name(),
            "application state loaded"
        );

        Ok(Self {
            config,
            cache: Arc::new(cache),
            history: Arc::new(history),
            stats: Arc::new(stats),
            recognizer,
        })
    }

    pub fn batch_processor(&self) -> BatchProcessor {
        BatchProcessor::new(
            Arc::clone(&self.recognizer),
            Arc::clone(&self.cache),
            Arc::clone(&self.stats),
            BatchLimits::from(&self.config.processing),
        )
    }

    /// Persist history and stats from memory.
    pub fn flush(&self) -> Result<()> {
        self.history.flush()?;
        self.stats.flush()
    }
}
