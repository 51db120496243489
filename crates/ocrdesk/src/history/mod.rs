//! Durable history of accepted recognitions.
//!
//! Layout of the history directory:
//!
//! ```text
//! history/
//!   history.json         JSON array of HistoryItem, oldest first
//!   <content-hash>.png   one image per distinct upload
//! ```
//!
//! Every mutation rewrites `history.json` atomically while holding the
//! store's lock. Items are stored oldest first but presented newest first;
//! [`display_to_storage_index`] is the only place that translates between
//! the two.

use chrono::NaiveDate;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::content_hash;
use crate::core::io::{ensure_dir, write_atomic, write_json_atomic};
use crate::error::{OcrDeskError, Result};
use crate::ocr::detect_file_type;
use crate::types::HistoryItem;

pub const HISTORY_LOG_FILE: &str = "history.json";

/// Map a newest-first display index to the oldest-first storage index.
///
/// Returns `None` when `display_index` is out of range.
pub fn display_to_storage_index(display_index: usize, len: usize) -> Option<usize> {
    if display_index < len {
        Some(len - 1 - display_index)
    } else {
        None
    }
}

/// Read a history log strictly.
///
/// Returns `Ok(None)` if the log does not exist.
pub fn read_log(path: &Path) -> Result<Option<Vec<HistoryItem>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(OcrDeskError::storage_with_source(
                format!("Failed to read history log {}", path.display()),
                e,
            ));
        }
    };

    let items = serde_json::from_slice::<Vec<HistoryItem>>(&bytes).map_err(|e| {
        OcrDeskError::corrupt_state_with_source(format!("History log {} is unreadable", path.display()), e)
    })?;
    Ok(Some(items))
}

/// Load a history log. Absence or corruption yields an empty history.
pub fn load_all(path: &Path) -> Vec<HistoryItem> {
    match read_log(path) {
        Ok(Some(items)) => items,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Starting with empty history");
            Vec::new()
        }
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    log_path: PathBuf,
    items: Mutex<Vec<HistoryItem>>,
}

impl HistoryStore {
    /// Open the history directory, loading any existing log.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        let log_path = dir.join(HISTORY_LOG_FILE);
        let items = load_all(&log_path);
        tracing::debug!(count = items.len(), "history loaded");

        Ok(Self {
            dir,
            log_path,
            items: Mutex::new(items),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Items in storage order (oldest first).
    pub fn items(&self) -> Vec<HistoryItem> {
        self.items.lock().clone()
    }

    /// Items in display order (newest first).
    pub fn display_items(&self) -> Vec<HistoryItem> {
        self.items.lock().iter().rev().cloned().collect()
    }

    /// Displayed items whose timestamp falls on `date` (UTC), newest first.
    pub fn items_on(&self, date: NaiveDate) -> Vec<HistoryItem> {
        self.items
            .lock()
            .iter()
            .rev()
            .filter(|item| item.timestamp.date_naive() == date)
            .cloned()
            .collect()
    }

    pub fn get(&self, display_index: usize) -> Option<HistoryItem> {
        let items = self.items.lock();
        display_to_storage_index(display_index, items.len()).map(|i| items[i].clone())
    }

    /// Persist an accepted result.
    ///
    /// The image is stored under its content hash before the record is
    /// added. If rewriting the log fails the record stays in memory and is
    /// written by the next successful mutation or [`flush`](Self::flush).
    pub fn append(
        &self,
        image_bytes: &[u8],
        text: impl Into<String>,
        language: impl Into<String>,
        processing_time: f64,
    ) -> Result<HistoryItem> {
        let image_file = format!(
            "{}.{}",
            content_hash(image_bytes),
            detect_file_type(image_bytes).extension()
        );
        let image_path = self.dir.join(&image_file);

        // The image check and write happen under the same lock delete uses to remove images.
        let mut items = self.items.lock();
        if !image_path.exists() {
            write_atomic(&image_path, image_bytes)?;
        }

        let item = HistoryItem {
            timestamp: chrono::Utc::now(),
            text: text.into(),
            language: language.into(),
            processing_time,
            image_file,
        };
        items.push(item.clone());
        write_json_atomic(&self.log_path, &*items)?;
        tracing::debug!(image = %item.image_file, count = items.len(), "history item appended");
        Ok(item)
    }

    /// Delete the item at `display_index` (newest first).
    ///
    /// Out-of-range indices are a logged no-op returning `Ok(None)`. The
    /// image file is removed once no remaining item refers to it.
    pub fn delete(&self, display_index: usize) -> Result<Option<HistoryItem>> {
        let mut items = self.items.lock();
        let Some(storage_index) = display_to_storage_index(display_index, items.len()) else {
            tracing::warn!(display_index, len = items.len(), "History index out of range, nothing deleted");
            return Ok(None);
        };

        let removed = items.remove(storage_index);
        if let Err(e) = write_json_atomic(&self.log_path, &*items) {
            items.insert(storage_index, removed);
            return Err(e);
        }

        if !items.iter().any(|i| i.image_file == removed.image_file) {
            self.remove_image(&removed.image_file);
        }

        Ok(Some(removed))
    }

    /// Replace the text of the item at `display_index`.
    ///
    /// The edit is kept in memory even if the log rewrite fails.
    pub fn update_text(&self, display_index: usize, text: impl Into<String>) -> Result<Option<HistoryItem>> {
        let mut items = self.items.lock();
        let Some(storage_index) = display_to_storage_index(display_index, items.len()) else {
            tracing::warn!(display_index, len = items.len(), "History index out of range, nothing updated");
            return Ok(None);
        };

        items[storage_index].text = text.into();
        let updated = items[storage_index].clone();
        write_json_atomic(&self.log_path, &*items)?;
        Ok(Some(updated))
    }

    /// Delete every referenced image and empty the log. Returns the number of removed items.
    pub fn clear(&self) -> Result<usize> {
        let mut items = self.items.lock();
        write_json_atomic(&self.log_path, &Vec::<HistoryItem>::new())?;

        let removed = std::mem::take(&mut *items);
        let mut seen = std::collections::HashSet::new();
        for item in &removed {
            if seen.insert(item.image_file.as_str()) {
                self.remove_image(&item.image_file);
            }
        }

        tracing::info!(count = removed.len(), "history cleared");
        Ok(removed.len())
    }

    /// Path of an item's image.
    ///
    /// Returns `None` for references that are not a plain file name.
    pub fn image_path(&self, item: &HistoryItem) -> Option<PathBuf> {
        self.resolve_image(&item.image_file)
    }

    fn resolve_image(&self, image_file: &str) -> Option<PathBuf> {
        let name = Path::new(image_file);
        let is_plain = name.components().count() == 1 && name.file_name().is_some_and(|f| f == name.as_os_str());
        is_plain.then(|| self.dir.join(name))
    }

    /// Read an item's image. A missing file is reported as `Ok(None)`.
    pub fn read_image(&self, item: &HistoryItem) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.image_path(item) else {
            tracing::warn!(image = %item.image_file, "History item has an invalid image reference");
            return Ok(None);
        };

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "History image is missing");
                Ok(None)
            }
            Err(e) => Err(OcrDeskError::storage_with_source(
                format!("Failed to read history image {}", path.display()),
                e,
            )),
        }
    }

    /// Rewrite the log from memory.
    pub fn flush(&self) -> Result<()> {
        let items = self.items.lock();
        write_json_atomic(&self.log_path, &*items)
    }

    fn remove_image(&self, image_file: &str) {
        let Some(path) = self.resolve_image(image_file) else {
            tracing::warn!(image = %image_file, "Invalid image reference, not removing");
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove history image"),
        }
    }
}
