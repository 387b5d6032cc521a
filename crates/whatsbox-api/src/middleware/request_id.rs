//! Request-id middleware.
//!
//! Reuses an inbound `X-Request-ID` when present (cross-service tracing),
//! otherwise generates one. The id is echoed on the response and held in a
//! task-local so error bodies can embed it without threading it through
//! every handler.

use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

tokio::task_local! {
    /// Request id of the HTTP request currently being served on this task.
    pub static REQUEST_ID: String;
}

/// Fetch the current request id, if running inside a request scope.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut response = REQUEST_ID
        .scope(request_id.clone(), next.run(request))
        .await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}
