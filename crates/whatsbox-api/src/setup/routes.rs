//! Route table and middleware stack.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{delete, get, head, options, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers::{admin, files, health, stats, tus};
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the configured maximum
/// file size; the handlers enforce the exact per-file limit themselves.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/api/admin/qr", get(admin::get_qr))
        .route("/api/admin/status", get(admin::get_status))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/stats", get(stats::get_stats))
        .route("/api/admin/stats/hourly", get(stats::get_hourly))
        .route("/api/admin/stats/daily", get(stats::get_daily))
        .route("/api/files", get(files::list))
        .route("/api/files/{id}", delete(files::delete))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::admin_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/status", get(health::status))
        .route("/api/admin/login", post(auth::login))
        .route("/api/admin/me", get(auth::me))
        .route("/api/admin/logout-session", post(auth::logout_session))
        .route("/api/files", post(files::upload))
        .route("/api/files/{id}", get(files::get))
        .route("/api/files/{id}/download", get(files::download))
        .route("/api/upload", options(tus::options).post(tus::create))
        .route(
            "/api/upload/{id}",
            head(tus::head).patch(tus::patch).delete(tus::delete),
        );

    let body_limit = state.config.max_upload_size as usize + BODY_LIMIT_SLACK;

    public_routes
        .merge(admin_routes)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Permissive CORS exposing the resumable-upload headers so browser
/// clients can drive the tus protocol.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static("upload-offset"),
            HeaderName::from_static("upload-length"),
            HeaderName::from_static("tus-version"),
            HeaderName::from_static("tus-resumable"),
            HeaderName::from_static("tus-max-size"),
            HeaderName::from_static("tus-extension"),
            HeaderName::from_static("location"),
            HeaderName::from_static("x-request-id"),
        ])
}
