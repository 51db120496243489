//! API server setup and configuration.

use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::core::config::OcrDeskConfig;
use crate::core::state::AppState;
use crate::error::{OcrDeskError, Result};

use super::{
    handlers::{
        batch_handler, cache_clear_handler, cache_stats_handler, compare_handler, export_handler, health_handler,
        history_append_handler, history_clear_handler, history_delete_handler, history_image_handler,
        history_list_handler, history_update_text_handler, info_handler, languages_handler, recognize_handler,
        stats_handler, stats_reset_handler,
    },
    types::{ApiSizeLimits, ApiState},
};

pub const UPLOAD_SIZE_ENV: &str = "OCRDESK_MAX_UPLOAD_SIZE_MB";
pub const CORS_ORIGINS_ENV: &str = "OCRDESK_CORS_ORIGINS";

/// Parse the request body limit from `OCRDESK_MAX_UPLOAD_SIZE_MB`.
///
/// Falls back to the default (100 MB) if not set, not a number or zero.
pub fn parse_size_limits_from_env() -> ApiSizeLimits {
    if let Ok(value) = std::env::var(UPLOAD_SIZE_ENV) {
        match value.trim().parse::<usize>() {
            Ok(mb) if mb > 0 => {
                tracing::info!("Upload size limit configured from environment: {} MB", mb);
                return ApiSizeLimits::from_mb(mb);
            }
            Ok(_) => tracing::warn!("Invalid {} value (must be > 0)", UPLOAD_SIZE_ENV),
            Err(_) => tracing::warn!("Failed to parse {}='{}', must be a valid usize", UPLOAD_SIZE_ENV, value),
        }
    }

    let limits = ApiSizeLimits::default();
    tracing::info!(
        "Upload size limit: {} bytes (default) - Configure with {}",
        limits.max_request_body_bytes,
        UPLOAD_SIZE_ENV
    );
    limits
}

/// CORS from `OCRDESK_CORS_ORIGINS` (comma-separated). Permissive when unset or empty.
pub fn cors_layer_from_env() -> CorsLayer {
    let Ok(origins_str) = std::env::var(CORS_ORIGINS_ENV) else {
        tracing::warn!(
            "CORS configured to allow all origins (default). Set {} to a comma-separated list of origins for production",
            CORS_ORIGINS_ENV
        );
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    };

    let origins: Vec<_> = origins_str
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("{} set but empty/invalid - falling back to permissive CORS", CORS_ORIGINS_ENV);
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    tracing::info!("CORS configured with {} explicit allowed origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the API router over shared application state.
///
/// This is public to allow embedding the router in another application.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ocrdesk::{AppState, OcrDeskConfig, api::create_router};
///
/// # fn main() -> ocrdesk::Result<()> {
/// let state = Arc::new(AppState::load(OcrDeskConfig::load(None)?)?);
/// let app = axum::Router::new().nest("/ocr", create_router(state));
/// # Ok(())
/// # }
/// ```
pub fn create_router(app: Arc<AppState>) -> Router {
    create_router_with_limits(app, ApiSizeLimits::default())
}

/// Create the API router with a custom request body limit.
pub fn create_router_with_limits(app: Arc<AppState>, limits: ApiSizeLimits) -> Router {
    let state = ApiState { app };

    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/languages", get(languages_handler))
        .route("/recognize", post(recognize_handler))
        .route("/batch", post(batch_handler))
        .route(
            "/history",
            get(history_list_handler)
                .post(history_append_handler)
                .delete(history_clear_handler),
        )
        .route("/history/{index}", delete(history_delete_handler))
        .route("/history/{index}/text", put(history_update_text_handler))
        .route("/history/{index}/image", get(history_image_handler))
        .route("/stats", get(stats_handler).delete(stats_reset_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache/clear", delete(cache_clear_handler))
        .route("/export/{format}", post(export_handler))
        .route("/compare", post(compare_handler))
        .layer(DefaultBodyLimit::max(limits.max_request_body_bytes))
        .layer(RequestBodyLimitLayer::new(limits.max_request_body_bytes))
        .layer(cors_layer_from_env())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server, loading configuration from `config_path` or by discovery.
///
/// # Environment Variables
///
/// ```bash
/// export OCRDESK_API_KEY=...
/// export OCRDESK_CORS_ORIGINS="https://app.example.com"
/// export OCRDESK_MAX_UPLOAD_SIZE_MB=100
/// ```
pub async fn serve(host: impl AsRef<str>, port: u16, config_path: Option<&Path>) -> Result<()> {
    let config = OcrDeskConfig::load(config_path)?;
    serve_with_config(host, port, config).await
}

/// Start the API server with explicit config.
pub async fn serve_with_config(host: impl AsRef<str>, port: u16, config: OcrDeskConfig) -> Result<()> {
    let app = Arc::new(AppState::load(config)?);
    serve_with_state(host, port, app, parse_size_limits_from_env()).await
}

/// Start the API server over existing state. Runs until Ctrl-C, then flushes history and stats.
pub async fn serve_with_state(
    host: impl AsRef<str>,
    port: u16,
    app: Arc<AppState>,
    limits: ApiSizeLimits,
) -> Result<()> {
    let ip: IpAddr = host
        .as_ref()
        .parse()
        .map_err(|e| OcrDeskError::validation(format!("Invalid host address: {}", e)))?;

    let addr = SocketAddr::new(ip, port);
    let router = create_router_with_limits(Arc::clone(&app), limits);

    tracing::info!("Starting ocrdesk API server on http://{}:{}", ip, port);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(OcrDeskError::Io)?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .map_err(|e| OcrDeskError::Other(e.to_string()))?;

    tracing::info!("Server stopped, flushing state");
    app.flush()
}
