//! Admin endpoints: QR pairing, connection status, upstream logout.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::HttpAppError;
use crate::state::AppState;

/// `GET /api/admin/qr`
///
/// The pairing session is owned by the gateway and outlives this request;
/// the browser polls while the code is cached.
pub async fn get_qr(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HttpAppError> {
    let qr = state.wa.qr().await?;
    Ok(Json(json!({"qr_code": qr.image, "timeout": qr.timeout})))
}

/// `GET /api/admin/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.wa.status())
}

/// `POST /api/admin/logout`: log out of the upstream session.
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, HttpAppError> {
    state.wa.logout().await?;
    Ok(Json(json!({"message": "Logged out successfully"})))
}
