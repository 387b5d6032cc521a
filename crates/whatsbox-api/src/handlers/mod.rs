//! HTTP handlers and shared request plumbing.

pub mod admin;
pub mod files;
pub mod health;
pub mod stats;
pub mod tus;

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use whatsbox_core::{AppError, Config};
use whatsbox_db::{FileRecord, FileStatus};

/// Public view of a stored file.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub download_url: String,
    pub password_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_downloads: Option<i64>,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: FileStatus,
}

impl From<&FileRecord> for FileResponse {
    fn from(file: &FileRecord) -> Self {
        FileResponse {
            id: file.id.clone(),
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            file_size: file.file_size,
            description: file.description.clone(),
            download_url: format!("/api/files/{}/download", file.id),
            password_protected: file.password_hash.is_some(),
            max_downloads: file.max_downloads,
            download_count: file.download_count,
            created_at: file.created_at,
            expires_at: file.expires_at,
            status: file.status,
        }
    }
}

/// Parsed upload options shared by the simple and resumable paths.
#[derive(Debug)]
pub struct UploadOptions {
    pub description: Option<String>,
    pub password_hash: Option<String>,
    pub max_downloads: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

/// Resolve the optional upload fields.
///
/// `expires_in` is seconds, converted to whole days; sub-day values and
/// values over the configured maximum are ignored in favor of the default.
/// `max_downloads` accepts only positive integers; anything else is
/// ignored.
pub fn resolve_upload_options(
    config: &Config,
    description: Option<&str>,
    password: Option<&str>,
    max_downloads: Option<&str>,
    expires_in: Option<&str>,
) -> Result<UploadOptions, AppError> {
    let description = description
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let password_hash = match password.filter(|p| !p.is_empty()) {
        Some(password) => Some(
            bcrypt::hash(password, bcrypt::DEFAULT_COST)
                .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))?,
        ),
        None => None,
    };

    let max_downloads = max_downloads
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|&n| n > 0);

    let mut expiry_days = config.default_expiry_days;
    if let Some(seconds) = expires_in.and_then(|raw| raw.parse::<i64>().ok()) {
        if seconds > 0 {
            let days = seconds / 86400;
            if days > 0 && days <= config.max_expiry_days {
                expiry_days = days;
            }
        }
    }

    Ok(UploadOptions {
        description,
        password_hash,
        max_downloads,
        expires_at: Utc::now() + Duration::days(expiry_days),
    })
}

/// Content-based MIME detection with a declared-type fallback.
pub fn detect_mime(data: &[u8], declared: Option<&str>) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    declared
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Best-effort client address for the access log: first hop of
/// `X-Forwarded-For`, else `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
