//! File repository.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use whatsbox_core::AppError;

use crate::models::{FileRecord, FileStatus};

const FILE_COLUMNS: &str = "id, filename, mime_type, file_size, file_hash, description, \
     direct_path, media_key, file_enc_hash, file_sha256, password_hash, max_downloads, \
     download_count, created_at, expires_at, status";

/// Outcome of the guarded download-count increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadCounter {
    Counted,
    /// The conditional UPDATE matched no row: the cap is already reached
    /// (or the row vanished). The caller must not serve the bytes.
    LimitReached,
}

/// Insert payload for a new file. The record always starts `active` with
/// a zero download count.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_hash: String,
    pub description: Option<String>,
    pub direct_path: String,
    pub media_key: Vec<u8>,
    pub file_enc_hash: Vec<u8>,
    pub file_sha256: Option<Vec<u8>>,
    pub password_hash: Option<String>,
    pub max_downloads: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, file: &NewFile) -> Result<FileRecord, AppError> {
        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO files (id, filename, mime_type, file_size, file_hash, description,
                direct_path, media_key, file_enc_hash, file_sha256, password_hash,
                max_downloads, download_count, created_at, expires_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13, ?14, 'active')
            "#,
        )
        .bind(&file.id)
        .bind(&file.filename)
        .bind(&file.mime_type)
        .bind(file.file_size)
        .bind(&file.file_hash)
        .bind(&file.description)
        .bind(&file.direct_path)
        .bind(&file.media_key)
        .bind(&file.file_enc_hash)
        .bind(&file.file_sha256)
        .bind(&file.password_hash)
        .bind(file.max_downloads)
        .bind(created_at)
        .bind(file.expires_at)
        .execute(&self.pool)
        .await?;

        self.get(&file.id)
            .await?
            .ok_or_else(|| AppError::internal("file row missing immediately after insert"))
    }

    pub async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Active file with the given plaintext hash, for duplicate detection.
    pub async fn get_by_hash(&self, hash: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE file_hash = ?1 AND status = 'active'"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<FileRecord>, AppError> {
        let rows = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The single correctness-critical statement: increment the download
    /// count only while it is below the cap. The database linearizes
    /// concurrent downloaders, so at most `max_downloads` ever succeed.
    pub async fn increment_download_count(&self, id: &str) -> Result<DownloadCounter, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE files SET download_count = download_count + 1
            WHERE id = ?1 AND (max_downloads IS NULL OR download_count < max_downloads)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(DownloadCounter::LimitReached)
        } else {
            Ok(DownloadCounter::Counted)
        }
    }

    pub async fn update_status(&self, id: &str, status: FileStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE files SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft delete: the row and its audit trail stay.
    pub async fn soft_delete(&self, id: &str) -> Result<(), AppError> {
        self.update_status(id, FileStatus::Deleted).await
    }

    /// Flip every active file past its expiry to `expired`. Returns the
    /// number of rows transitioned.
    pub async fn mark_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE files SET status = 'expired' WHERE status = 'active' AND expires_at < ?1",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self, status: Option<FileStatus>) -> Result<i64, AppError> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE status = ?1")
                    .bind(status)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM files")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    pub async fn total_active_size(&self) -> Result<i64, AppError> {
        let size: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(file_size), 0) FROM files WHERE status = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(size)
    }
}
