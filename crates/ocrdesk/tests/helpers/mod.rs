//! Shared test doubles and fixtures.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ocrdesk::ocr::languages::{display_name, normalize_code};
use ocrdesk::{AppState, OcrDeskConfig, OcrDeskError, QualityLevel, RecognitionResult, Recognizer, Result};

/// In-process recognizer with scripted behaviour.
///
/// Returns `text:<payload as lossy utf-8>`. Payloads starting with `fail`
/// produce a remote error; payloads matching a registered prefix sleep first.
#[derive(Default)]
pub struct ScriptedRecognizer {
    calls: AtomicUsize,
    payloads: Mutex<Vec<Vec<u8>>>,
    delays: Vec<(Vec<u8>, Duration)>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, prefix: &[u8], delay: Duration) -> Self {
        self.delays.push((prefix.to_vec(), delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }
}

pub fn expected_text(payload: &[u8]) -> String {
    format!("text:{}", String::from_utf8_lossy(payload))
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, image_bytes: &[u8], language: &str, _quality: QualityLevel) -> Result<RecognitionResult> {
        let code = normalize_code(language)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().push(image_bytes.to_vec());

        if let Some((_, delay)) = self.delays.iter().find(|(prefix, _)| image_bytes.starts_with(prefix)) {
            tokio::time::sleep(*delay).await;
        }

        if image_bytes.starts_with(b"fail") {
            return Err(OcrDeskError::remote("quota exceeded"));
        }

        Ok(RecognitionResult {
            text: expected_text(image_bytes),
            processing_time: 0.25,
            language: display_name(code)?.to_string(),
            detected_language: code.to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Config rooted in `dir` with optimization off so payloads reach the recognizer unchanged.
pub fn test_config(dir: &Path) -> OcrDeskConfig {
    let mut config = OcrDeskConfig::default();
    config.storage.data_dir = dir.to_path_buf();
    config.processing.optimize = false;
    config.processing.max_file_size_mb = 1;
    config.processing.max_batch_size_mb = 4;
    config
}

pub fn test_state(dir: &Path, recognizer: Arc<ScriptedRecognizer>) -> AppState {
    AppState::with_recognizer(test_config(dir), recognizer).unwrap()
}

/// A solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
