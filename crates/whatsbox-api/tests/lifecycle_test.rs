//! Janitor lifecycle and shutdown-drain behavior.
//!
//! Lives in its own test binary: the janitor's stats loop flushes and
//! resets the process-global collector, which would race other stats
//! assertions sharing the process.
//!
//! Run with: `cargo test -p whatsbox-api --test lifecycle_test`

mod helpers;

use chrono::{Duration as ChronoDuration, DurationRound, Utc};
use helpers::spawn_app;
use tokio_util::sync::CancellationToken;
use whatsbox_api::jobs::Janitor;

#[tokio::test]
async fn janitor_stops_promptly_and_flushes_on_the_way_out() {
    let app = spawn_app().await;
    let collector = app.state.collector;

    let shutdown = CancellationToken::new();
    let janitor = Janitor::start(app.state.clone(), &shutdown);

    // Let the immediate first ticks run (the stats loop flushes and
    // resets once on startup).
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // Counters accumulated after the startup flush...
    collector.record_upload(42);

    // ...must survive shutdown via the terminal flush.
    tokio::time::timeout(std::time::Duration::from_secs(5), janitor.stop())
        .await
        .expect("janitor stop timed out");

    let hour = Utc::now()
        .duration_trunc(ChronoDuration::hours(1))
        .unwrap();
    let rows = app
        .state
        .stats
        .hourly_range(hour, hour + ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].uploads >= 1);
    assert!(rows[0].upload_bytes >= 42);
}

#[tokio::test]
async fn active_transfer_gauges_drain_after_requests() {
    let app = spawn_app().await;

    // A request cycle leaves no stuck gauge behind; the shutdown drain
    // loop depends on this reaching zero.
    let part = axum_test::multipart::Part::bytes(b"drain-me".to_vec())
        .file_name("d.txt")
        .mime_type("text/plain");
    let form = axum_test::multipart::MultipartForm::new().add_part("file", part);
    let body: serde_json::Value = app.server.post("/api/files").multipart(form).await.json();
    let id = body["id"].as_str().unwrap();

    app.server
        .get(&format!("/api/files/{id}/download"))
        .await;

    assert_eq!(app.state.collector.active_transfers(), 0);
}
