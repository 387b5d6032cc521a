//! Background janitor: four independent periodic loops.
//!
//! Each loop fires once immediately, then ticks on its period. Errors are
//! logged and the loop carries on; only the shutdown token ends a loop.
//! The stats loop performs a terminal flush so in-flight counters are not
//! lost on shutdown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use whatsbox_db::StatsHourlyRow;

use crate::state::AppState;

const EXPIRE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const PURGE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const STATS_INTERVAL: Duration = Duration::from_secs(60 * 60);
const ACCESS_LOG_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn stale_upload_age() -> ChronoDuration {
    ChronoDuration::hours(24)
}

fn hourly_retention() -> ChronoDuration {
    ChronoDuration::days(7)
}

fn access_log_retention() -> ChronoDuration {
    ChronoDuration::days(30)
}

pub struct Janitor {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Janitor {
    /// Spawn all four loops. `shutdown` is the process-wide token; the
    /// janitor derives a child so it can also be stopped independently.
    pub fn start(state: Arc<AppState>, shutdown: &CancellationToken) -> Janitor {
        tracing::info!("starting background janitor");
        let token = shutdown.child_token();
        let handles = vec![
            tokio::spawn(expire_loop(state.clone(), token.clone())),
            tokio::spawn(purge_uploads_loop(state.clone(), token.clone())),
            tokio::spawn(stats_loop(state.clone(), token.clone())),
            tokio::spawn(access_log_loop(state, token.clone())),
        ];
        Janitor { token, handles }
    }

    /// Cancel and join every loop. The stats loop flushes before exiting.
    pub async fn stop(self) {
        tracing::info!("stopping background janitor");
        self.token.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "janitor loop panicked");
            }
        }
        tracing::info!("background janitor stopped");
    }
}

async fn expire_loop(state: Arc<AppState>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(EXPIRE_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => expire_pass(&state).await,
        }
    }
}

pub async fn expire_pass(state: &AppState) {
    match state.files.mark_expired().await {
        Ok(count) if count > 0 => tracing::info!(count, "marked expired files"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "failed to mark expired files"),
    }
}

async fn purge_uploads_loop(state: Arc<AppState>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => purge_pass(&state).await,
        }
    }
}

/// Delete stale upload rows, then sweep the temp directory for files with
/// no backing row (orphan reconciliation works in both directions: a row
/// without a temp file dies here too, on its age alone).
pub async fn purge_pass(state: &AppState) {
    let cutoff = Utc::now() - stale_upload_age();
    match state.uploads.delete_older_than(cutoff).await {
        Ok(count) if count > 0 => tracing::info!(count, "deleted incomplete uploads"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "failed to delete old uploads"),
    }

    purge_orphaned_temp_files(state).await;
}

async fn purge_orphaned_temp_files(state: &AppState) {
    let temp_dir = Path::new(&state.config.temp_dir);
    let mut entries = match tokio::fs::read_dir(temp_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
        Err(err) => {
            tracing::error!(error = %err, "failed to read temp directory");
            return;
        }
    };

    let mut cleaned = 0usize;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_dir() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        let old_enough = matches!(age, Some(age) if age >= Duration::from_secs(24 * 60 * 60));
        if !old_enough {
            continue;
        }

        // Keep anything still backed by an upload row.
        let upload_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".tmp"));
        if let Some(upload_id) = upload_id {
            match state.uploads.get(upload_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(error = %err, upload_id, "orphan check failed");
                    continue;
                }
            }
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => cleaned += 1,
            Err(err) => {
                tracing::error!(error = %err, path = %path.display(), "failed to remove orphaned temp file");
            }
        }
    }

    if cleaned > 0 {
        tracing::info!(count = cleaned, "cleaned orphaned temp files");
    }
}

async fn stats_loop(state: Arc<AppState>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                // Terminal flush so counters accumulated since the last
                // tick survive the shutdown.
                flush_stats(&state).await;
                return;
            }
            _ = ticker.tick() => {
                flush_stats(&state).await;
                if chrono::Local::now().hour() == 0 {
                    rollup_daily(&state).await;
                }
            }
        }
    }
}

/// Flush the collector delta into this hour's bucket, then reset. On a
/// write failure the counters are left intact so the next flush carries
/// the same delta forward.
pub async fn flush_stats(state: &AppState) {
    let snapshot = state.collector.snapshot();
    let hour = current_hour();
    let bucket = StatsHourlyRow {
        hour,
        uploads: snapshot.uploads_total,
        downloads: snapshot.downloads_total,
        upload_bytes: snapshot.bytes_uploaded,
        download_bytes: snapshot.bytes_downloaded,
        failed_uploads: snapshot.upload_errors,
        failed_downloads: snapshot.download_errors,
        requests: 0,
    };

    match state.stats.add_hourly(&bucket).await {
        Ok(()) => {
            state.collector.reset();
            tracing::debug!(hour = %hour, "hourly stats flushed");
        }
        Err(err) => tracing::error!(error = %err, "failed to flush hourly stats"),
    }
}

async fn rollup_daily(state: &AppState) {
    let yesterday = (Utc::now() - ChronoDuration::days(1)).date_naive();
    match state.stats.aggregate_daily(yesterday).await {
        Ok(()) => tracing::info!(date = %yesterday, "aggregated daily stats"),
        Err(err) => tracing::error!(error = %err, "failed to aggregate daily stats"),
    }

    match state
        .stats
        .delete_hourly_before(Utc::now() - hourly_retention())
        .await
    {
        Ok(count) if count > 0 => tracing::info!(count, "deleted old hourly stats"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "failed to delete old hourly stats"),
    }
}

async fn access_log_loop(state: Arc<AppState>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(ACCESS_LOG_INTERVAL);
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => access_log_pass(&state).await,
        }
    }
}

pub async fn access_log_pass(state: &AppState) {
    match state
        .access_log
        .delete_older_than(Utc::now() - access_log_retention())
        .await
    {
        Ok(count) if count > 0 => tracing::info!(count, "deleted old access logs"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "failed to delete old access logs"),
    }
}

fn current_hour() -> DateTime<Utc> {
    Utc::now()
        .duration_trunc(ChronoDuration::hours(1))
        .expect("hour truncation cannot fail")
}
