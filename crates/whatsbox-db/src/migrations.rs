//! Idempotent boot-time schema migrations.
//!
//! Tables and indexes use `CREATE ... IF NOT EXISTS`; column additions
//! check `pragma_table_info` first so the whole pass can be re-run against
//! any prior schema version.

use sqlx::SqlitePool;
use whatsbox_core::AppError;

const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS files (
        id              TEXT PRIMARY KEY,
        filename        TEXT NOT NULL,
        mime_type       TEXT NOT NULL,
        file_size       INTEGER NOT NULL,
        file_hash       TEXT NOT NULL,
        description     TEXT,

        direct_path     TEXT NOT NULL,
        media_key       BLOB NOT NULL,
        file_enc_hash   BLOB NOT NULL,

        password_hash   TEXT,
        max_downloads   INTEGER,
        download_count  INTEGER NOT NULL DEFAULT 0,

        created_at      DATETIME NOT NULL,
        expires_at      DATETIME NOT NULL,

        status          TEXT NOT NULL DEFAULT 'active'
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_files_hash ON files(file_hash)",
    "CREATE INDEX IF NOT EXISTS idx_files_expires_at ON files(expires_at)",
    "CREATE INDEX IF NOT EXISTS idx_files_status ON files(status)",
    r#"CREATE TABLE IF NOT EXISTS uploads (
        id              TEXT PRIMARY KEY,
        filename        TEXT,
        file_size       INTEGER,
        offset          INTEGER NOT NULL DEFAULT 0,
        metadata        TEXT,
        created_at      DATETIME NOT NULL,
        updated_at      DATETIME NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS stats_hourly (
        hour            DATETIME PRIMARY KEY,
        uploads         INTEGER NOT NULL DEFAULT 0,
        downloads       INTEGER NOT NULL DEFAULT 0,
        upload_bytes    INTEGER NOT NULL DEFAULT 0,
        download_bytes  INTEGER NOT NULL DEFAULT 0,
        failed_uploads  INTEGER NOT NULL DEFAULT 0,
        failed_downloads INTEGER NOT NULL DEFAULT 0,
        requests        INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS stats_daily (
        date            DATE PRIMARY KEY,
        uploads         INTEGER NOT NULL DEFAULT 0,
        downloads       INTEGER NOT NULL DEFAULT 0,
        upload_bytes    INTEGER NOT NULL DEFAULT 0,
        download_bytes  INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS access_log (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id         TEXT NOT NULL,
        action          TEXT NOT NULL,
        ip_address      TEXT,
        user_agent      TEXT,
        created_at      DATETIME NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_access_log_file_id ON access_log(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_access_log_created_at ON access_log(created_at)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    for migration in MIGRATIONS {
        if let Err(err) = sqlx::query(migration).execute(pool).await {
            tracing::error!(error = %err, sql = migration, "migration failed");
            return Err(err.into());
        }
    }

    migrate_columns(pool).await?;

    tracing::info!("database migrations completed");
    Ok(())
}

/// ALTER TABLE additions, gated on the pragma so re-runs are no-ops.
async fn migrate_columns(pool: &SqlitePool) -> Result<(), AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('files') WHERE name = 'file_sha256'",
    )
    .fetch_one(pool)
    .await?;

    if count == 0 {
        sqlx::query("ALTER TABLE files ADD COLUMN file_sha256 BLOB")
            .execute(pool)
            .await?;
        tracing::info!("added file_sha256 column to files table");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_rerunnable() {
        let pool = crate::test_pool().await;
        // Second and third passes must be no-ops, including the ALTER.
        run_migrations(&pool).await.expect("second run");
        run_migrations(&pool).await.expect("third run");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('files') WHERE name = 'file_sha256'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
