//! HTTP API for ocrdesk.
//!
//! An Axum router over a shared [`AppState`](crate::AppState), for
//! presentation layers that prefer talking HTTP to linking the library.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /info` - Version, recognition endpoint and language codes
//! - `GET /languages` - Language code to display name
//! - `POST /recognize` - Recognize one image (multipart `image`, `language`, `quality`)
//! - `POST /batch` - Recognize many images (multipart `files`, `settings`, `save_history`)
//! - `GET /history` - History, newest first (`?date=YYYY-MM-DD`)
//! - `POST /history` - Append an item (multipart `image`, `text`, `language`, `processing_time`)
//! - `PUT /history/{index}/text` - Replace an item's text
//! - `GET /history/{index}/image` - An item's stored image
//! - `DELETE /history/{index}` - Delete an item
//! - `DELETE /history` - Clear history
//! - `GET /stats`, `DELETE /stats` - Statistics snapshot and reset
//! - `GET /cache/stats`, `DELETE /cache/clear` - Cache maintenance
//! - `POST /export/{txt|pdf}` - Render `{text}` as a file
//! - `POST /compare` - Compare `{first, second}`
//!
//! # cURL Examples
//!
//! ```bash
//! curl -F "image=@receipt.jpg" -F "language=de" http://localhost:8000/recognize
//!
//! curl -F "files=@a.png" -F "files=@b.png" \
//!      -F 'settings={"language":"en","quality":"high"}' -F "save_history=true" \
//!      http://localhost:8000/batch
//!
//! curl "http://localhost:8000/history?date=2026-10-19"
//! curl -X DELETE http://localhost:8000/history/0
//! ```

mod error;
mod handlers;
mod server;
mod types;

pub use error::ApiError;
pub use server::{
    CORS_ORIGINS_ENV, UPLOAD_SIZE_ENV, cors_layer_from_env, create_router, create_router_with_limits,
    parse_size_limits_from_env, serve, serve_with_config, serve_with_state,
};
pub use types::{
    ApiSizeLimits, ApiState, BatchResponse, CacheClearResponse, CacheStatsResponse, CompareRequest, ErrorResponse,
    ExportRequest, HealthResponse, HistoryClearResponse, HistoryDeleteResponse, HistoryEntry, HistoryQuery,
    InfoResponse, LanguagesResponse, UpdateTextRequest,
};
