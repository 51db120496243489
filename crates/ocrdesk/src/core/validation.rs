//! Upload validation before a batch starts.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{OcrDeskError, Result};
use crate::types::BatchItem;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "pdf"];

/// Whether the file name carries an accepted extension (case-insensitive).
pub fn is_allowed_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// # Errors
///
/// `OcrDeskError::PayloadTooLarge` when `size > limit`.
pub fn check_file_size(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(OcrDeskError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedUpload {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadValidation {
    pub accepted: Vec<BatchItem>,
    pub rejected: Vec<RejectedUpload>,
}

/// Split uploads into accepted and rejected items.
///
/// The combined size of all uploads is checked first against
/// `max_total_bytes`; exceeding it rejects the whole submission. Each file
/// is then checked for an allowed extension and against `max_file_bytes`.
///
/// # Errors
///
/// `OcrDeskError::PayloadTooLarge` if the combined size is over the limit.
pub fn validate_upload(items: Vec<BatchItem>, max_file_bytes: usize, max_total_bytes: usize) -> Result<UploadValidation> {
    let total: usize = items.iter().map(|i| i.bytes.len()).sum();
    check_file_size(total, max_total_bytes)?;

    let mut validation = UploadValidation::default();
    for item in items {
        if !is_allowed_file(&item.name) {
            tracing::warn!(name = %item.name, "Skipping upload with unsupported format");
            validation.rejected.push(RejectedUpload {
                reason: format!("Unsupported file format: {}", item.name),
                name: item.name,
            });
            continue;
        }

        if let Err(e) = check_file_size(item.bytes.len(), max_file_bytes) {
            tracing::warn!(name = %item.name, size = item.bytes.len(), "Skipping oversized upload");
            validation.rejected.push(RejectedUpload {
                reason: format!("File {} is too large: {}", item.name, e),
                name: item.name,
            });
            continue;
        }

        validation.accepted.push(item);
    }

    Ok(validation)
}
