//! Cumulative processing statistics.
//!
//! A single [`StatsTracker`] is shared by everything in the process. Each
//! update is applied in memory and the full snapshot is rewritten to disk
//! while holding the lock, so concurrent batches never lose an update and
//! never interleave writes. If the write fails the in-memory counters still
//! reflect the update and the error is returned to the caller.

use chrono::Utc;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::io::write_json_atomic;
use crate::error::{OcrDeskError, Result};
use crate::types::StatsSnapshot;

#[derive(Debug)]
pub struct StatsTracker {
    path: PathBuf,
    state: Mutex<StatsSnapshot>,
}

/// Read a stats file strictly.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// `OcrDeskError::CorruptState` if the file cannot be parsed,
/// `OcrDeskError::Storage` if it cannot be read.
pub fn read_snapshot(path: &Path) -> Result<Option<StatsSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(OcrDeskError::storage_with_source(
                format!("Failed to read stats file {}", path.display()),
                e,
            ));
        }
    };

    let snapshot = serde_json::from_slice::<StatsSnapshot>(&bytes).map_err(|e| {
        OcrDeskError::corrupt_state_with_source(format!("Stats file {} is unreadable", path.display()), e)
    })?;
    Ok(Some(snapshot))
}

/// Load a stats file, recovering from absence or corruption with a zeroed snapshot.
pub fn load(path: &Path) -> StatsSnapshot {
    match read_snapshot(path) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => StatsSnapshot::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Resetting statistics");
            StatsSnapshot::default()
        }
    }
}

impl StatsTracker {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = load(&path);
        Self {
            path,
            state: Mutex::new(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count one processed item.
    pub fn record(&self, success: bool, byte_size: u64) -> Result<StatsSnapshot> {
        self.update(|s| {
            s.total_processed += 1;
            if success {
                s.total_success += 1;
            } else {
                s.total_failed += 1;
            }
            s.total_bytes += byte_size;
        })
    }

    /// Count one item served from the cache: processed and successful, no bytes.
    pub fn record_cache_hit(&self) -> Result<StatsSnapshot> {
        self.update(|s| {
            s.total_processed += 1;
            s.total_success += 1;
            s.cache_hits += 1;
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StatsSnapshot)) -> Result<StatsSnapshot> {
        let mut state = self.state.lock();
        apply(&mut state);
        state.last_processed = Some(Utc::now());
        let snapshot = state.clone();
        write_json_atomic(&self.path, &*state)?;
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.state.lock().clone()
    }

    /// Zero every counter and persist.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        *state = StatsSnapshot::default();
        write_json_atomic(&self.path, &*state)?;
        tracing::info!("statistics reset");
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let state = self.state.lock();
        write_json_atomic(&self.path, &*state)
    }
}
