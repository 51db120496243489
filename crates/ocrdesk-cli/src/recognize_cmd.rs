//! `ocrdesk recognize`

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use ocrdesk::core::io::read_file_async;
use ocrdesk::core::validate_upload;
use ocrdesk::{AppState, BatchItem, BatchItemResult, BatchProgress, BatchSettings, RecognitionOutcome};
use tokio_util::sync::CancellationToken;

use crate::OutputFormat;

async fn read_items(files: &[PathBuf]) -> Result<Vec<BatchItem>> {
    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let bytes = read_file_async(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        items.push(BatchItem::new(name, bytes));
    }
    Ok(items)
}

fn print_text(out: &mut impl Write, results: &[BatchItemResult]) -> std::io::Result<()> {
    for slot in results {
        writeln!(out, "== {} ==", slot.name)?;
        match &slot.outcome {
            RecognitionOutcome::Success(result) => {
                let source = if slot.from_cache { ", cached" } else { "" };
                writeln!(out, "[{}, {:.2}s{}]", result.language, result.processing_time, source)?;
                writeln!(out, "{}", result.text)?;
            }
            RecognitionOutcome::Failure(error) => writeln!(out, "error: {}", error.message)?,
        }
        if let Some(warning) = &slot.storage_warning {
            writeln!(out, "warning: {}", warning)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Append every success to history. Failures are collected, not fatal.
fn save_to_history(state: &AppState, results: &[BatchItemResult], originals: &[Vec<u8>]) -> Vec<String> {
    let mut errors = Vec::new();
    for slot in results {
        let Some(result) = slot.outcome.result() else {
            continue;
        };
        if let Err(e) = state.history.append(
            &originals[slot.index],
            &result.text,
            &result.detected_language,
            result.processing_time,
        ) {
            tracing::warn!(name = %slot.name, error = %e, "Failed to save result to history");
            errors.push(format!("{}: {}", slot.name, e));
        }
    }
    errors
}

pub async fn run(
    state: &AppState,
    files: Vec<PathBuf>,
    settings: BatchSettings,
    save: bool,
    format: OutputFormat,
) -> Result<()> {
    run_to(&mut std::io::stdout(), state, files, settings, save, format).await
}

async fn run_to(
    out: &mut impl Write,
    state: &AppState,
    files: Vec<PathBuf>,
    settings: BatchSettings,
    save: bool,
    format: OutputFormat,
) -> Result<()> {
    let processing = &state.config.processing;
    let validation = validate_upload(read_items(&files).await?, processing.max_file_bytes(), processing.max_batch_bytes())?;
    for rejected in &validation.rejected {
        eprintln!("skipped {}: {}", rejected.name, rejected.reason);
    }
    if validation.accepted.is_empty() {
        bail!("No files left to process");
    }

    let originals: Vec<Vec<u8>> = if save {
        validation.accepted.iter().map(|i| i.bytes.clone()).collect()
    } else {
        Vec::new()
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, finishing items in progress");
            on_interrupt.cancel();
        }
    });

    let progress = |p: BatchProgress| eprintln!("{}/{}", p.completed, p.total);
    let results = state
        .batch_processor()
        .process_with_cancel(validation.accepted, &settings, Some(&progress), &cancel)
        .await;

    let history_errors = if save {
        save_to_history(state, &results, &originals)
    } else {
        Vec::new()
    };

    match format {
        OutputFormat::Text => print_text(out, &results)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?,
    }
    out.flush()?;

    for error in &history_errors {
        eprintln!("history not saved for {}", error);
    }

    let failed = results.iter().filter(|r| !r.outcome.is_success()).count();
    if failed > 0 {
        bail!("{} of {} item(s) failed", failed, results.len());
    }
    if !history_errors.is_empty() {
        bail!("{} result(s) could not be saved to history", history_errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ocrdesk::{OcrDeskConfig, QualityLevel, RecognitionResult, Recognizer};

    struct Echo;

    #[async_trait]
    impl Recognizer for Echo {
        async fn recognize(&self, image_bytes: &[u8], language: &str, _quality: QualityLevel) -> ocrdesk::Result<RecognitionResult> {
            Ok(RecognitionResult {
                text: String::from_utf8_lossy(image_bytes).into_owned(),
                processing_time: 0.1,
                language: "English".to_string(),
                detected_language: language.to_string(),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn echo_state(dir: &std::path::Path) -> AppState {
        let mut config = OcrDeskConfig::default();
        config.storage.data_dir = dir.join("data");
        config.processing.optimize = false;
        AppState::with_recognizer(config, Arc::new(Echo)).unwrap()
    }

    #[tokio::test]
    async fn test_prints_results_before_reporting_history_failure() {
        let dir = tempfile::tempdir().unwrap();
        let state = echo_state(dir.path());
        std::fs::create_dir_all(state.config.storage.history_dir().join("history.json")).unwrap();

        let input = dir.path().join("page.png");
        std::fs::write(&input, b"hello from page").unwrap();
        let settings = state.config.processing.batch_settings();

        let mut out = Vec::new();
        let err = run_to(&mut out, &state, vec![input], settings, true, OutputFormat::Json)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("could not be saved to history"));
        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed[0]["text"], "hello from page");
    }

    #[tokio::test]
    async fn test_saves_history_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let state = echo_state(dir.path());

        let input = dir.path().join("page.png");
        std::fs::write(&input, b"saved text").unwrap();
        let settings = state.config.processing.batch_settings();

        let mut out = Vec::new();
        run_to(&mut out, &state, vec![input], settings, true, OutputFormat::Text)
            .await
            .unwrap();

        assert!(String::from_utf8(out).unwrap().contains("saved text"));
        assert_eq!(state.history.get(0).unwrap().text, "saved text");
    }
}
