//! Content-addressed cache of recognition results.
//!
//! Entries are keyed by a digest of the *original* image bytes, so a
//! re-upload of the same file hits no matter which optimization settings
//! were used for the remote call. Each entry is one `<key>.json` file
//! holding a serialized [`RecognitionResult`].
//!
//! A corrupt entry is treated as a miss and removed.

pub mod eviction;

use crate::core::io::{ensure_dir, is_temp_file, write_json_atomic};
use crate::error::{OcrDeskError, Result};
use crate::types::RecognitionResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use eviction::{CacheEntryInfo, EvictionPolicy, LruByMtime, NoEviction};

/// Cache key hash format width (32 hex digits for a 128-bit digest)
pub const CACHE_KEY_HASH_WIDTH: usize = 32;

const ENTRY_EXTENSION: &str = "json";

/// Deterministic content hash of raw bytes.
///
/// SHA-256 truncated to 128 bits, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..CACHE_KEY_HASH_WIDTH / 2])
}

fn is_valid_key(key: &str) -> bool {
    key.len() == CACHE_KEY_HASH_WIDTH && key.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheClearStats {
    pub removed_files: usize,
    pub freed_mb: f64,
}

#[derive(Debug)]
pub struct ContentCache {
    cache_dir: PathBuf,
    eviction: Box<dyn EvictionPolicy>,
}

impl ContentCache {
    /// Open (and create) a cache directory with no eviction.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_eviction(cache_dir, Box::new(NoEviction))
    }

    pub fn with_eviction(cache_dir: impl Into<PathBuf>, eviction: Box<dyn EvictionPolicy>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        ensure_dir(&cache_dir)?;
        Ok(Self { cache_dir, eviction })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn eviction_policy(&self) -> &dyn EvictionPolicy {
        self.eviction.as_ref()
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// Look up the result for `raw_bytes`.
    pub fn lookup(&self, raw_bytes: &[u8]) -> Result<Option<RecognitionResult>> {
        self.get(&content_hash(raw_bytes))
    }

    /// Store `result` under the hash of `raw_bytes`, overwriting any existing entry.
    pub fn store(&self, raw_bytes: &[u8], result: &RecognitionResult) -> Result<()> {
        self.put(&content_hash(raw_bytes), result)
    }

    /// Look up an entry by precomputed key.
    pub fn get(&self, key: &str) -> Result<Option<RecognitionResult>> {
        if !is_valid_key(key) {
            return Err(OcrDeskError::validation(format!("Invalid cache key: {}", key)));
        }

        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key, "cache miss");
                return Ok(None);
            }
            Err(e) => {
                return Err(OcrDeskError::storage_with_source(
                    format!("Failed to read cache entry {}", path.display()),
                    e,
                ));
            }
        };

        match serde_json::from_slice::<RecognitionResult>(&bytes) {
            Ok(result) => {
                tracing::debug!(key, "cache hit");
                touch(&path);
                Ok(Some(result))
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding corrupt cache entry");
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Store an entry by precomputed key.
    pub fn put(&self, key: &str, result: &RecognitionResult) -> Result<()> {
        if !is_valid_key(key) {
            return Err(OcrDeskError::validation(format!("Invalid cache key: {}", key)));
        }

        write_json_atomic(self.entry_path(key), result)?;
        tracing::debug!(key, "cache store");
        self.evict();
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntryInfo>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let read_dir = fs::read_dir(&self.cache_dir)
            .map_err(|e| OcrDeskError::storage_with_source("Failed to read cache directory", e))?;

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if is_temp_file(&name) {
                continue;
            }
            if let Some(ext) = path.extension()
                && ext == ENTRY_EXTENSION
                && let Ok(metadata) = entry.metadata()
            {
                entries.push(CacheEntryInfo {
                    path,
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }
        Ok(entries)
    }

    fn evict(&self) {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping cache eviction");
                return;
            }
        };

        let victims = self.eviction.select_victims(&entries);
        if victims.is_empty() {
            return;
        }

        tracing::debug!(policy = self.eviction.name(), count = victims.len(), "evicting cache entries");
        for victim in victims {
            let _ = fs::remove_file(victim);
        }
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries()?;
        let total_size_bytes: u64 = entries.iter().map(|e| e.size).sum();

        Ok(CacheStats {
            total_files: entries.len(),
            total_size_mb: total_size_bytes as f64 / 1024.0 / 1024.0,
        })
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<CacheClearStats> {
        let entries = self.entries()?;
        let mut removed_files = 0;
        let mut freed_bytes = 0u64;

        for entry in entries {
            if fs::remove_file(&entry.path).is_ok() {
                removed_files += 1;
                freed_bytes += entry.size;
            }
        }

        tracing::info!(removed_files, "cache cleared");
        Ok(CacheClearStats {
            removed_files,
            freed_mb: freed_bytes as f64 / 1024.0 / 1024.0,
        })
    }
}

fn touch(path: &Path) {
    if let Ok(file) = fs::File::options().write(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}
