//! Row types for the five metadata tables.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Lifecycle state of a stored file. Once a file leaves `Active` it never
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Active,
    Expired,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Active => "active",
            FileStatus::Expired => "expired",
            FileStatus::Deleted => "deleted",
        }
    }
}

/// A stored file. The upstream handle quadruple (`direct_path`,
/// `media_key`, `file_enc_hash`, `file_sha256`) is opaque to us and never
/// mutated after insert; `file_sha256` may be NULL on rows created before
/// the column existed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRecord {
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
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: FileStatus,
}

/// An in-progress resumable upload. The row exists iff its backing
/// `{id}.tmp` file exists; the janitor reconciles orphans on both sides.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UploadRecord {
    pub id: String,
    pub filename: Option<String>,
    pub file_size: Option<i64>,
    pub offset: i64,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessLogRecord {
    pub id: i64,
    pub file_id: String,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One hourly bucket; doubles as the write carrier for the additive
/// flush UPSERT.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StatsHourlyRow {
    pub hour: DateTime<Utc>,
    pub uploads: i64,
    pub downloads: i64,
    pub upload_bytes: i64,
    pub download_bytes: i64,
    pub failed_uploads: i64,
    pub failed_downloads: i64,
    pub requests: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StatsDailyRow {
    pub date: NaiveDate,
    pub uploads: i64,
    pub downloads: i64,
    pub upload_bytes: i64,
    pub download_bytes: i64,
}
