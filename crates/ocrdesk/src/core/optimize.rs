//! Payload optimization before the remote call.
//!
//! Oversized images are downscaled to fit `max_dimension` and everything
//! decodable is re-encoded as JPEG. The result is only ever sent to the
//! recognizer; cache keys and stored history images use the original bytes.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{OcrDeskError, Result};

pub const DEFAULT_MAX_DIMENSION: u32 = 2000;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Downscale and re-encode `bytes`.
///
/// # Errors
///
/// `OcrDeskError::ImageProcessing` if the bytes are not a decodable raster
/// image (PDFs included) or encoding fails.
pub fn optimize_image(bytes: &[u8], options: &OptimizeOptions) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrDeskError::image_processing_with_source("Failed to decode image", e))?;

    let (width, height) = img.dimensions();
    let img = if width > options.max_dimension || height > options.max_dimension {
        tracing::debug!(
            width,
            height,
            max = options.max_dimension,
            "downscaling image before recognition"
        );
        img.resize(options.max_dimension, options.max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, options.jpeg_quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| OcrDeskError::image_processing_with_source("Failed to encode JPEG", e))?;

    Ok(out)
}

/// Optimize, falling back to the original bytes when they cannot be decoded.
pub fn optimize_or_original(bytes: &[u8], options: &OptimizeOptions) -> Vec<u8> {
    match optimize_image(bytes, options) {
        Ok(optimized) => optimized,
        Err(e) => {
            tracing::debug!(error = %e, "sending original bytes unoptimized");
            bytes.to_vec()
        }
    }
}
