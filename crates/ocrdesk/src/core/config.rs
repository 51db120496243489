//! Configuration loading and management.
//!
//! Configuration can be loaded from TOML or JSON, discovered by walking up
//! from the current directory looking for `ocrdesk.toml`, or built in code.
//!
//! # Example
//!
//! ```rust
//! use ocrdesk::core::config::OcrDeskConfig;
//!
//! let config = OcrDeskConfig::default();
//! assert_eq!(config.processing.language, "en");
//! assert_eq!(config.processing.max_file_size_mb, 10);
//! ```
//!
//! ```toml
//! [ocr]
//! api_key = "..."
//! timeout_secs = 30
//!
//! [storage]
//! data_dir = ".ocrdesk"
//! cache_max_entries = 5000
//!
//! [processing]
//! language = "de"
//! quality = "high"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::optimize::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, OptimizeOptions};
use crate::ocr::client::DEFAULT_ENDPOINT;
use crate::ocr::languages::is_supported;
use crate::types::{BatchSettings, QualityLevel};
use crate::{OcrDeskError, Result};

pub const CONFIG_FILE_NAME: &str = "ocrdesk.toml";

/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_ENV_VARS: [&str; 2] = ["OCRDESK_API_KEY", "OCR_SPACE_API_KEY"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrDeskConfig {
    pub ocr: OcrSettings,
    pub storage: StorageSettings,
    pub processing: ProcessingSettings,
}

/// Remote recognizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub endpoint: String,
    /// Falls back to `OCRDESK_API_KEY`, then `OCR_SPACE_API_KEY`.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Optional language catalog endpoint; the built-in table is used when unset or unreachable.
    pub catalog_url: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: 30,
            catalog_url: None,
        }
    }
}

impl OcrSettings {
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key
            && !key.trim().is_empty()
        {
            return Some(key.clone());
        }

        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// On-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    /// Enables LRU-by-mtime cache eviction above this many entries.
    pub cache_max_entries: Option<usize>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ocrdesk"),
            cache_max_entries: None,
        }
    }
}

impl StorageSettings {
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join("stats.json")
    }
}

/// Default batch settings and processing limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub language: String,
    pub quality: QualityLevel,
    pub optimize: bool,
    pub use_cache: bool,
    pub parallel: bool,
    pub max_file_size_mb: usize,
    /// Combined size limit for one submitted batch.
    pub max_batch_size_mb: usize,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    /// Worker pool size for parallel batches. Defaults to twice the CPU count.
    pub max_concurrent: Option<usize>,
    /// Count cache hits as processed items in the statistics.
    pub count_cache_hits: bool,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            quality: QualityLevel::Medium,
            optimize: true,
            use_cache: true,
            parallel: true,
            max_file_size_mb: 10,
            max_batch_size_mb: 10,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_concurrent: None,
            count_cache_hits: true,
        }
    }
}

impl ProcessingSettings {
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            language: self.language.clone(),
            quality: self.quality,
            optimize: self.optimize,
            use_cache: self.use_cache,
            parallel: self.parallel,
        }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn max_batch_bytes(&self) -> usize {
        self.max_batch_size_mb * 1024 * 1024
    }

    pub fn optimize_options(&self) -> OptimizeOptions {
        OptimizeOptions {
            max_dimension: self.max_dimension,
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent.unwrap_or_else(|| num_cpus::get() * 2).max(1)
    }
}

impl OcrDeskConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `OcrDeskError::Validation` if file doesn't exist or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OcrDeskError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| OcrDeskError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OcrDeskError::validation(format!("Failed to read config file {}: {}", path.as_ref().display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| OcrDeskError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load from a file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `ocrdesk.toml` in current directory and parent directories.
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(OcrDeskError::Io)?;

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Explicit file if given, otherwise discovery, otherwise defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover()? {
                Some(config) => {
                    tracing::info!("Loaded configuration from discovered {}", CONFIG_FILE_NAME);
                    config
                }
                None => {
                    tracing::debug!("No config file found, using default configuration");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `OcrDeskError::Validation` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.ocr.endpoint.trim().is_empty() {
            return Err(OcrDeskError::validation("ocr.endpoint must not be empty"));
        }
        if self.ocr.timeout_secs == 0 {
            return Err(OcrDeskError::validation("ocr.timeout_secs must be greater than 0"));
        }
        if self.processing.max_file_size_mb == 0 {
            return Err(OcrDeskError::validation(
                "processing.max_file_size_mb must be greater than 0",
            ));
        }
        if self.processing.max_batch_size_mb == 0 {
            return Err(OcrDeskError::validation(
                "processing.max_batch_size_mb must be greater than 0",
            ));
        }
        if self.processing.max_dimension == 0 {
            return Err(OcrDeskError::validation("processing.max_dimension must be greater than 0"));
        }
        if !(1..=100).contains(&self.processing.jpeg_quality) {
            return Err(OcrDeskError::validation(format!(
                "processing.jpeg_quality must be between 1 and 100, got {}",
                self.processing.jpeg_quality
            )));
        }
        if self.processing.max_concurrent == Some(0) {
            return Err(OcrDeskError::validation(
                "processing.max_concurrent must be greater than 0",
            ));
        }
        if !is_supported(&self.processing.language) {
            return Err(OcrDeskError::validation(format!(
                "processing.language '{}' is not supported",
                self.processing.language
            )));
        }
        if self.storage.cache_max_entries == Some(0) {
            return Err(OcrDeskError::validation(
                "storage.cache_max_entries must be greater than 0",
            ));
        }
        Ok(())
    }
}
