//! API error types
//!
//! Whole-request failures only. Per-item envelope rejections are not errors;
//! they ride in the batch response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (non-array body, empty batch, missing fields)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No usable credentials
    #[error("authentication required")]
    Unauthorized,

    /// Credentials present but wrong
    #[error("permission denied")]
    Forbidden,

    /// The store is unreachable; the whole batch is rejected and the
    /// producer should retry
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Unavailable(_) => "service_unavailable",
        }
    }
}

impl From<sb_store::StoreError> for ApiError {
    fn from(e: sb_store::StoreError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };

        tracing::warn!(
            error_code = body.error,
            error_message = %body.message,
            status = %status,
            "request failed"
        );

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers
pub type Result<T> = std::result::Result<T, ApiError>;
