//! HTTP rendering for [`AppError`].
//!
//! Preferred handler pattern: return `Result<impl IntoResponse,
//! HttpAppError>` and let `?` lift any error that converts into
//! `AppError`. Every error body has the shape
//! `{"error": code, "message": human, "request_id": uuid}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;
use whatsbox_core::error::LogLevel;
use whatsbox_core::AppError;

use crate::middleware::request_id::current_request_id;

/// Newtype so `IntoResponse` (an axum trait) can be implemented for the
/// core error type without the orphan rule getting in the way.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<sqlx::Error> for HttpAppError {
    fn from(err: sqlx::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<std::io::Error> for HttpAppError {
    fn from(err: std::io::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

fn log_error(error: &AppError, request_id: &str) {
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, request_id = %request_id, "request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, request_id = %request_id, "request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, request_id = %request_id, "request failed");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let error = &self.0;
        let request_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());

        log_error(error, &request_id);

        let status = StatusCode::from_u16(error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({
            "error": error.error_code(),
            "message": error.client_message(),
            "request_id": request_id,
        });

        // 409 on a stale PATCH carries the authoritative offset so the
        // client can resume without an extra HEAD.
        if let AppError::OffsetMismatch { current_offset } = error {
            body["current_offset"] = json!(current_offset);
        }

        (status, Json(body)).into_response()
    }
}
