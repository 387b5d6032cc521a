//! Metadata store: SQLite via sqlx.
//!
//! All persistent state flows through the repositories in this crate;
//! there is no other path to the database. Timestamps are always bound
//! from Rust (`Utc::now()`) rather than SQL `CURRENT_TIMESTAMP` so the
//! stored text representation stays uniform and comparable.

mod access_log;
mod files;
mod migrations;
mod models;
mod stats;
mod uploads;

pub use access_log::{AccessAction, AccessLogRepository};
pub use files::{DownloadCounter, FileRepository, NewFile};
pub use migrations::run_migrations;
pub use models::{AccessLogRecord, FileRecord, FileStatus, StatsDailyRow, StatsHourlyRow, UploadRecord};
pub use stats::StatsRepository;
pub use uploads::{NewUpload, UploadRepository};

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use whatsbox_core::AppError;

/// Open (creating if missing) the metadata database, configure WAL mode
/// and the busy timeout, and run migrations. Fatal on failure.
pub async fn connect(database_path: &str) -> Result<SqlitePool, AppError> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    tracing::info!(path = %database_path, "metadata database ready");
    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection: each `sqlite::memory:` connection would otherwise get
    // its own empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    pool
}
