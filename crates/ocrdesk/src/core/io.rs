//! File I/O utilities.
//!
//! Every persisted file (cache entries, history log, history images, stats)
//! is written through [`write_atomic`]: the bytes land in a uniquely named
//! temp file next to the destination, which is then renamed over it. A
//! reader never observes a half-written file.

use crate::{OcrDeskError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;

/// Read a user-supplied input file asynchronously.
///
/// # Errors
///
/// Returns `OcrDeskError::Io` for I/O errors (these always bubble up).
pub async fn read_file_async(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    async_fs::read(path.as_ref()).await.map_err(OcrDeskError::Io)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ocrdesk".to_string());
    let pid = std::process::id();
    let thread_id = std::thread::current().id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!("{}.tmp.{}.{:?}.{}", file_name, pid, thread_id, timestamp);
    match path.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    }
}

/// Atomically replace `path` with `bytes`.
///
/// # Errors
///
/// Returns `OcrDeskError::Storage` if the temp file cannot be written or the
/// rename fails. The temp file is removed on failure.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    fs::write(&temp_path, bytes).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        OcrDeskError::storage_with_source(format!("Failed to write temp file for {}", path.display()), e)
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        OcrDeskError::storage_with_source(format!("Failed to replace {}", path.display()), e)
    })?;

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Create `dir` and its parents.
///
/// # Errors
///
/// Returns `OcrDeskError::Storage` when the directory cannot be created.
pub fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .map_err(|e| OcrDeskError::storage_with_source(format!("Failed to create directory {}", dir.display()), e))
}

/// Whether `name` is a leftover temp file from [`write_atomic`].
pub fn is_temp_file(name: &str) -> bool {
    name.contains(".tmp.")
}
