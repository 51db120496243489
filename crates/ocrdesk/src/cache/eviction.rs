//! Pluggable eviction for the content cache.
//!
//! The cache never expires entries on its own. A policy is consulted after
//! every store and returns the entry files that should be removed.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// On-disk facts about one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Decides which cache entries to drop.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Return the paths to delete, given every current entry.
    fn select_victims(&self, entries: &[CacheEntryInfo]) -> Vec<PathBuf>;

    fn name(&self) -> &str;
}

/// Keep everything. Growth is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEviction;

impl EvictionPolicy for NoEviction {
    fn select_victims(&self, _entries: &[CacheEntryInfo]) -> Vec<PathBuf> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Keep at most `max_entries`, dropping the least recently used first.
///
/// Recency is the file mtime; cache hits touch it.
#[derive(Debug, Clone, Copy)]
pub struct LruByMtime {
    pub max_entries: usize,
}

impl LruByMtime {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }
}

impl EvictionPolicy for LruByMtime {
    fn select_victims(&self, entries: &[CacheEntryInfo]) -> Vec<PathBuf> {
        if entries.len() <= self.max_entries {
            return Vec::new();
        }

        let mut sorted: Vec<&CacheEntryInfo> = entries.iter().collect();
        sorted.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

        let excess = entries.len() - self.max_entries;
        sorted.into_iter().take(excess).map(|e| e.path.clone()).collect()
    }

    fn name(&self) -> &str {
        "lru-mtime"
    }
}
