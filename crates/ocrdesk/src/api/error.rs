//! Mapping of library errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{ErrorKind, OcrDeskError};
use crate::types::RecognitionError;

use super::types::ErrorResponse;

/// An error returned from a handler, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

fn error_type_name(err: &OcrDeskError) -> &'static str {
    match err {
        OcrDeskError::Io(_) => "IoError",
        OcrDeskError::UnsupportedLanguage(_) => "UnsupportedLanguage",
        OcrDeskError::PayloadTooLarge { .. } => "PayloadTooLarge",
        OcrDeskError::Remote { .. } => "RemoteError",
        OcrDeskError::Storage { .. } => "StorageError",
        OcrDeskError::CorruptState { .. } => "CorruptState",
        OcrDeskError::Validation { .. } => "ValidationError",
        OcrDeskError::ImageProcessing { .. } => "ImageProcessingError",
        OcrDeskError::Serialization { .. } => "SerializationError",
        OcrDeskError::Cancelled => "Cancelled",
        OcrDeskError::Other(_) => "Error",
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnsupportedLanguage | ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Remote => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn kind_type_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::UnsupportedLanguage => "UnsupportedLanguage",
        ErrorKind::PayloadTooLarge => "PayloadTooLarge",
        ErrorKind::Remote => "RemoteError",
        ErrorKind::Storage => "StorageError",
        ErrorKind::CorruptState => "CorruptState",
        ErrorKind::Validation => "ValidationError",
        ErrorKind::ImageProcessing => "ImageProcessingError",
        ErrorKind::Cancelled => "Cancelled",
        ErrorKind::Internal => "Error",
    }
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error_type: error_type.to_string(),
                message: message.into(),
                status_code: status.as_u16(),
            },
        }
    }

    /// 400 with the error's own message.
    pub fn validation(err: OcrDeskError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_type_name(&err), err.to_string())
    }

    /// 500 with the error's own message.
    pub fn internal(err: OcrDeskError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error_type_name(&err), err.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }
}

impl From<OcrDeskError> for ApiError {
    fn from(err: OcrDeskError) -> Self {
        Self::new(status_for(err.kind()), error_type_name(&err), err.to_string())
    }
}

impl From<&RecognitionError> for ApiError {
    fn from(err: &RecognitionError) -> Self {
        Self::new(status_for(err.kind), kind_type_name(err.kind), err.message.clone())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), message = %self.body.message, "request failed");
        } else {
            tracing::debug!(status = self.status.as_u16(), message = %self.body.message, "request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}
