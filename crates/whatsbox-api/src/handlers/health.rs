//! Liveness, readiness, and the public status probe.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `GET /ready`: ready only once the upstream session is connected.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.wa.is_connected() {
        (
            StatusCode::OK,
            Json(json!({"status": "ready", "whatsapp": "connected"})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "whatsapp": "disconnected"})),
        )
    }
}

/// `GET /api/status`: public connection indicator for the frontend.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({"connected": state.wa.is_connected()}))
}
