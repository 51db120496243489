//! API request handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::header,
    response::{IntoResponse, Response},
};

use crate::core::validation::{check_file_size, validate_upload};
use crate::error::OcrDeskError;
use crate::export::{ExportFormat, export};
use crate::ocr::languages::normalize_code;
use crate::ocr::{BUILTIN_LANGUAGES, LanguageCatalog, detect_file_type};
use crate::text::{ComparisonResult, compare_results};
use crate::types::{BatchItem, BatchSettings, QualityLevel, RecognitionOutcome, RecognitionRequest, RecognitionResult, StatsSnapshot};

use super::{
    error::ApiError,
    types::{
        ApiState, BatchResponse, CacheClearResponse, CacheStatsResponse, CompareRequest, ExportRequest, HealthResponse,
        HistoryClearResponse, HistoryDeleteResponse, HistoryEntry, HistoryQuery, InfoResponse, LanguagesResponse,
        UpdateTextRequest,
    },
};

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::validation(OcrDeskError::validation(e.to_string()))
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Health check endpoint handler.
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Server info endpoint handler.
///
/// GET /info
pub async fn info_handler(State(state): State<ApiState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoint: state.app.config.ocr.endpoint.clone(),
        recognizer: state.app.recognizer.name().to_string(),
        languages: BUILTIN_LANGUAGES.iter().map(|l| l.code.to_string()).collect(),
    })
}

/// Language table endpoint handler.
///
/// GET /languages
///
/// Queries `ocr.catalog_url` when configured, falling back to the built-in table.
pub async fn languages_handler(State(state): State<ApiState>) -> Json<LanguagesResponse> {
    let ocr = &state.app.config.ocr;
    let catalog = match &ocr.catalog_url {
        Some(url) => LanguageCatalog::fetch(url, ocr.timeout()).await,
        None => LanguageCatalog::builtin(),
    };
    Json(catalog.languages)
}

/// Single image relay.
///
/// POST /recognize
///
/// Accepts multipart form data with:
/// - `image`: the image to recognize
/// - `language` (optional): internal language code, defaults to `processing.language`
/// - `quality` (optional): `low`, `medium` or `high`
///
/// An unsupported language is rejected with 400 before anything is sent to
/// the recognizer. Recognition failures map to the status of their error
/// kind (502 for remote failures).
pub async fn recognize_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<RecognitionResult>, ApiError> {
    let processing = &state.app.config.processing;
    let mut settings = processing.batch_settings();
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                image = Some((file_name, data.to_vec()));
            }
            "language" => settings.language = field_text(field).await?,
            "quality" => settings.quality = field_text(field).await?.parse::<QualityLevel>()?,
            _ => {}
        }
    }

    let Some((name, bytes)) = image else {
        return Err(ApiError::validation(OcrDeskError::validation("No image provided")));
    };

    settings.language = normalize_code(&settings.language)?.to_string();
    check_file_size(bytes.len(), processing.max_file_bytes())?;

    let request = RecognitionRequest::new(bytes, &settings);
    let slot = state.app.batch_processor().process_request(name, request).await?;

    match slot.outcome {
        RecognitionOutcome::Success(result) => Ok(Json(result)),
        RecognitionOutcome::Failure(error) => Err(ApiError::from(&error)),
    }
}

/// Batch endpoint handler.
///
/// POST /batch
///
/// Accepts multipart form data with:
/// - `files`: one or more images
/// - `settings` (optional): JSON [`BatchSettings`], defaults to the `[processing]` section
/// - `save_history` (optional): `true` to append every success to history
///
/// Uploads with an unsupported extension or over `max_file_size_mb` are
/// reported in `rejected`; a submission over `max_batch_size_mb` in total is
/// rejected with 413. The remaining items are processed and returned in
/// upload order.
pub async fn batch_handler(State(state): State<ApiState>, mut multipart: Multipart) -> Result<Json<BatchResponse>, ApiError> {
    let processing = &state.app.config.processing;
    let mut settings = processing.batch_settings();
    let mut save_history = false;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "files" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("upload-{}", uploads.len() + 1));
                let data = field.bytes().await.map_err(multipart_error)?;
                uploads.push(BatchItem::new(file_name, data.to_vec()));
            }
            "settings" => {
                let raw = field_text(field).await?;
                settings = serde_json::from_str::<BatchSettings>(&raw).map_err(|e| {
                    ApiError::validation(OcrDeskError::validation(format!("Invalid batch settings: {}", e)))
                })?;
            }
            "save_history" => {
                save_history = matches!(field_text(field).await?.trim(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(ApiError::validation(OcrDeskError::validation("No files provided")));
    }

    let validation = validate_upload(uploads, processing.max_file_bytes(), processing.max_batch_bytes())?;
    let originals: Vec<Vec<u8>> = if save_history {
        validation.accepted.iter().map(|i| i.bytes.clone()).collect()
    } else {
        Vec::new()
    };

    let results = state
        .app
        .batch_processor()
        .process(validation.accepted, &settings)
        .await;

    let mut saved_to_history = 0;
    let mut history_errors = Vec::new();
    if save_history {
        for slot in &results {
            let Some(result) = slot.outcome.result() else {
                continue;
            };
            match state.app.history.append(
                &originals[slot.index],
                &result.text,
                &result.detected_language,
                result.processing_time,
            ) {
                Ok(_) => saved_to_history += 1,
                Err(e) => {
                    tracing::warn!(name = %slot.name, error = %e, "Failed to save result to history");
                    history_errors.push(format!("{}: {}", slot.name, e));
                }
            }
        }
    }

    Ok(Json(BatchResponse {
        results,
        rejected: validation.rejected,
        saved_to_history,
        history_errors,
    }))
}

/// History listing.
///
/// GET /history
///
/// Newest first. With `?date=YYYY-MM-DD` only items recorded on that UTC day
/// are listed; their `index` still addresses the full list.
pub async fn history_list_handler(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let entries = state
        .app
        .history
        .display_items()
        .into_iter()
        .enumerate()
        .filter(|(_, item)| query.date.is_none_or(|date| item.timestamp.date_naive() == date))
        .map(|(index, item)| HistoryEntry::new(index, item))
        .collect();
    Json(entries)
}

/// POST /history
///
/// Multipart `image`, `text`, `language` and `processing_time`.
pub async fn history_append_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<HistoryEntry>, ApiError> {
    let mut image = None;
    let mut text = None;
    let mut language = None;
    let mut processing_time = 0.0;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "image" => image = Some(field.bytes().await.map_err(multipart_error)?.to_vec()),
            "text" => text = Some(field_text(field).await?),
            "language" => language = Some(field_text(field).await?),
            "processing_time" => {
                let raw = field_text(field).await?;
                processing_time = raw.trim().parse::<f64>().map_err(|_| {
                    ApiError::validation(OcrDeskError::validation(format!("Invalid processing_time '{}'", raw)))
                })?;
            }
            _ => {}
        }
    }

    let (Some(image), Some(text)) = (image, text) else {
        return Err(ApiError::validation(OcrDeskError::validation(
            "History entries need an image and a text",
        )));
    };
    let language = language.unwrap_or_else(|| state.app.config.processing.language.clone());

    let item = state.app.history.append(&image, text, language, processing_time)?;
    Ok(Json(HistoryEntry::new(0, item)))
}

/// PUT /history/{index}/text
pub async fn history_update_text_handler(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
    Json(request): Json<UpdateTextRequest>,
) -> Result<Json<HistoryEntry>, ApiError> {
    match state.app.history.update_text(index, request.text)? {
        Some(item) => Ok(Json(HistoryEntry::new(index, item))),
        None => Err(ApiError::not_found(format!("No history item at index {}", index))),
    }
}

/// GET /history/{index}/image
///
/// Returns 404 when the index is out of range or the image file is gone.
pub async fn history_image_handler(State(state): State<ApiState>, Path(index): Path<usize>) -> Result<Response, ApiError> {
    let Some(item) = state.app.history.get(index) else {
        return Err(ApiError::not_found(format!("No history item at index {}", index)));
    };
    let Some(bytes) = state.app.history.read_image(&item)? else {
        return Err(ApiError::not_found(format!("Image {} is missing", item.image_file)));
    };

    let mime = detect_file_type(&bytes).mime_type();
    Ok(([(header::CONTENT_TYPE, mime)], Bytes::from(bytes)).into_response())
}

/// DELETE /history/{index}
///
/// An out-of-range index is not an error; the response says nothing was deleted.
pub async fn history_delete_handler(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
) -> Result<Json<HistoryDeleteResponse>, ApiError> {
    let item = state.app.history.delete(index)?;
    Ok(Json(HistoryDeleteResponse {
        deleted: item.is_some(),
        item,
    }))
}

/// DELETE /history
pub async fn history_clear_handler(State(state): State<ApiState>) -> Result<Json<HistoryClearResponse>, ApiError> {
    let removed_items = state.app.history.clear()?;
    Ok(Json(HistoryClearResponse { removed_items }))
}

/// GET /stats
pub async fn stats_handler(State(state): State<ApiState>) -> Json<StatsSnapshot> {
    Json(state.app.stats.snapshot())
}

/// DELETE /stats
pub async fn stats_reset_handler(State(state): State<ApiState>) -> Result<Json<StatsSnapshot>, ApiError> {
    state.app.stats.reset()?;
    Ok(Json(state.app.stats.snapshot()))
}

/// Cache stats endpoint handler.
///
/// GET /cache/stats
pub async fn cache_stats_handler(State(state): State<ApiState>) -> Result<Json<CacheStatsResponse>, ApiError> {
    let cache = &state.app.cache;
    let stats = cache.stats().map_err(ApiError::internal)?;

    Ok(Json(CacheStatsResponse {
        directory: cache.cache_dir().to_string_lossy().to_string(),
        total_files: stats.total_files,
        total_size_mb: stats.total_size_mb,
    }))
}

/// Cache clear endpoint handler.
///
/// DELETE /cache/clear
pub async fn cache_clear_handler(State(state): State<ApiState>) -> Result<Json<CacheClearResponse>, ApiError> {
    let cache = &state.app.cache;
    let cleared = cache.clear().map_err(ApiError::internal)?;

    Ok(Json(CacheClearResponse {
        directory: cache.cache_dir().to_string_lossy().to_string(),
        removed_files: cleared.removed_files,
        freed_mb: cleared.freed_mb,
    }))
}

/// POST /export/{format}
///
/// `format` is `txt` or `pdf`. The body is returned as an attachment.
pub async fn export_handler(Path(format): Path<String>, Json(request): Json<ExportRequest>) -> Result<Response, ApiError> {
    let format: ExportFormat = format.parse()?;
    let bytes = export(&request.text, format)?;
    let disposition = format!("attachment; filename=\"ocr_result.{}\"", format.extension());

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(bytes),
    )
        .into_response())
}

/// POST /compare
pub async fn compare_handler(Json(request): Json<CompareRequest>) -> Json<ComparisonResult> {
    Json(compare_results(&request.first, &request.second))
}
