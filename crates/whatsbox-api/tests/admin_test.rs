//! Admin auth, admin endpoints, health probes.
//!
//! Run with: `cargo test -p whatsbox-api --test admin_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{spawn_app, spawn_app_with};
use serde_json::json;

#[tokio::test]
async fn health_and_status_probes() {
    let app = spawn_app().await;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");

    let response = app.server.get("/ready").await;
    assert_eq!(response.status_code(), 200);

    let response = app.server.get("/api/status").await;
    assert_eq!(response.json::<serde_json::Value>()["connected"], true);

    app.session.set_transport_up(false);
    assert_eq!(app.server.get("/ready").await.status_code(), 503);
    let response = app.server.get("/api/status").await;
    assert_eq!(response.json::<serde_json::Value>()["connected"], false);
}

#[tokio::test]
async fn admin_endpoints_without_configured_password_are_503() {
    let app = spawn_app().await; // no ADMIN_PASSWORD

    let response = app.server.get("/api/admin/stats").await;
    assert_eq!(response.status_code(), 503);
    assert_eq!(
        response.json::<serde_json::Value>()["error"],
        "auth_not_configured"
    );

    // Login itself reports auth is disabled.
    let response = app
        .server
        .post("/api/admin/login")
        .json(&json!({"password": "anything"}))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<serde_json::Value>()["error"], "auth_disabled");
}

#[tokio::test]
async fn admin_login_flow() {
    let app = spawn_app_with(|config| config.admin_password = "hunter2".into()).await;

    // Wrong password.
    let response = app
        .server
        .post("/api/admin/login")
        .json(&json!({"password": "wrong"}))
        .await;
    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<serde_json::Value>()["error"],
        "invalid_credentials"
    );

    // No cookie: protected endpoints are 401.
    let response = app.server.get("/api/admin/stats").await;
    assert_eq!(response.status_code(), 401);
    assert_eq!(response.json::<serde_json::Value>()["error"], "unauthorized");

    // Garbage cookie: 401 and the cookie is cleared.
    let response = app
        .server
        .get("/api/admin/stats")
        .add_header("cookie", "whatsbox_admin_session=garbage")
        .await;
    assert_eq!(response.status_code(), 401);
    assert!(response.headers().get("set-cookie").is_some());

    // Proper login.
    let cookie = app.admin_cookie().await;
    let response = app
        .server
        .get("/api/admin/stats")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert!(body["realtime"].is_object());
    assert!(body["storage"]["total_files"].is_number());

    // /api/admin/me reflects the session.
    let response = app.server.get("/api/admin/me").await;
    assert_eq!(response.json::<serde_json::Value>()["authenticated"], false);
    let response = app
        .server
        .get("/api/admin/me")
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.json::<serde_json::Value>()["authenticated"], true);

    // logout-session clears the cookie.
    let response = app.server.post("/api/admin/logout-session").await;
    let cleared = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn stats_history_endpoints() {
    let app = spawn_app_with(|config| config.admin_password = "hunter2".into()).await;
    let cookie = app.admin_cookie().await;

    let response = app
        .server
        .get("/api/admin/stats/hourly?hours=48")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["period"]["hours"], 48);
    assert!(body["data"].is_array());

    // Out-of-range values fall back to the default window.
    let response = app
        .server
        .get("/api/admin/stats/hourly?hours=9999")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.json::<serde_json::Value>()["period"]["hours"], 24);

    let response = app
        .server
        .get("/api/admin/stats/daily?days=7")
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<serde_json::Value>()["period"]["days"], 7);
}

#[tokio::test]
async fn file_list_and_delete_are_admin_only() {
    let app = spawn_app_with(|config| config.admin_password = "hunter2".into()).await;

    // Public upload, then try the admin surface without a session.
    let part = Part::bytes(b"data".to_vec())
        .file_name("f.txt")
        .mime_type("text/plain");
    let body: serde_json::Value = app
        .server
        .post("/api/files")
        .multipart(MultipartForm::new().add_part("file", part))
        .await
        .json();
    let id = body["id"].as_str().unwrap().to_string();

    assert_eq!(app.server.get("/api/files").await.status_code(), 401);
    assert_eq!(
        app.server
            .delete(&format!("/api/files/{id}"))
            .await
            .status_code(),
        401
    );

    let cookie = app.admin_cookie().await;

    let response = app
        .server
        .get("/api/files")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["files"][0]["id"], id);

    // Soft delete, then delete again: conflict.
    let response = app
        .server
        .delete(&format!("/api/files/{id}"))
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<serde_json::Value>()["id"], id);

    let response = app
        .server
        .delete(&format!("/api/files/{id}"))
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<serde_json::Value>()["error"], "already_deleted");

    // Deleted files refuse downloads.
    let response = app.server.get(&format!("/api/files/{id}/download")).await;
    assert_eq!(response.status_code(), 410);
    assert_eq!(response.json::<serde_json::Value>()["error"], "file_deleted");
}

#[tokio::test]
async fn qr_pairing_endpoint() {
    let app = spawn_app_with(|config| config.admin_password = "hunter2".into()).await;
    let cookie = app.admin_cookie().await;

    // Already paired: conflict.
    let response = app
        .server
        .get("/api/admin/qr")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(
        response.json::<serde_json::Value>()["error"],
        "already_logged_in"
    );

    // Unpaired: the fake session hands out a code, rendered as PNG.
    app.session.set_logged_in(false);
    let response = app
        .server
        .get("/api/admin/qr")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["timeout"], 60);
    assert!(!body["qr_code"].as_str().unwrap().is_empty());

    // Upstream status endpoint.
    let response = app
        .server
        .get("/api/admin/status")
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["logged_in"], false);
}

#[tokio::test]
async fn upstream_logout() {
    let app = spawn_app_with(|config| config.admin_password = "hunter2".into()).await;
    let cookie = app.admin_cookie().await;

    let response = app
        .server
        .post("/api/admin/logout")
        .add_header("cookie", cookie.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(!app.state.wa.is_logged_in());

    // Logging out twice is a conflict.
    let response = app
        .server
        .post("/api/admin/logout")
        .add_header("cookie", cookie)
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<serde_json::Value>()["error"], "not_logged_in");
}

#[tokio::test]
async fn every_error_body_carries_a_request_id() {
    let app = spawn_app().await;

    let response = app.server.get("/api/files/zzzzzz").await;
    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert!(!body["request_id"].as_str().unwrap().is_empty());

    // Inbound ids are reused and echoed.
    let response = app
        .server
        .get("/api/files/zzzzzz")
        .add_header("x-request-id", "trace-me-123")
        .await;
    assert_eq!(response.headers().get("x-request-id").unwrap(), "trace-me-123");
    assert_eq!(
        response.json::<serde_json::Value>()["request_id"],
        "trace-me-123"
    );
}
