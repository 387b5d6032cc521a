//! Resumable uploads (tus 1.0.0, extensions: creation, termination).
//!
//! State per upload id lives in the `uploads` table plus one `{id}.tmp`
//! file; the offset equality check is the only guard against concurrent
//! PATCHes, exactly as the protocol intends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header::HeaderName, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use whatsbox_core::{filename::sanitize_filename, hash_file, ids::short_id, AppError, Config};
use whatsbox_db::{NewFile, NewUpload, UploadRecord};

use crate::error::HttpAppError;
use crate::handlers::{detect_mime, resolve_upload_options};
use crate::state::AppState;

pub const TUS_VERSION: &str = "1.0.0";
pub const TUS_EXTENSIONS: &str = "creation,termination";
const UPLOAD_ID_LENGTH: usize = 12;
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(600);

const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");
const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");

pub fn temp_path(config: &Config, upload_id: &str) -> PathBuf {
    PathBuf::from(&config.temp_dir).join(format!("{upload_id}.tmp"))
}

/// Write a chunk at its claimed position. Positioned writes keep racing
/// chunks from corrupting each other's ranges.
async fn write_chunk_at(
    path: &std::path::Path,
    offset: u64,
    chunk: &[u8],
) -> std::io::Result<()> {
    use tokio::io::{AsyncSeekExt, AsyncWriteExt};

    let mut file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    file.write_all(chunk).await?;
    file.flush().await?;
    Ok(())
}

/// Parse an `Upload-Metadata` header: comma-separated `key base64(value)`
/// pairs. Malformed pairs are skipped, matching the protocol's lenient
/// reading.
pub fn parse_metadata(header: &str) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for pair in header.split(',') {
        let pair = pair.trim();
        let Some((key, encoded)) = pair.split_once(' ') else {
            continue;
        };
        let Ok(decoded) = BASE64.decode(encoded.trim()) else {
            continue;
        };
        let Ok(value) = String::from_utf8(decoded) else {
            continue;
        };
        metadata.insert(key.trim().to_string(), value);
    }
    metadata
}

fn require_tus_version(headers: &HeaderMap) -> Result<(), AppError> {
    match headers.get(&TUS_RESUMABLE).and_then(|v| v.to_str().ok()) {
        Some(TUS_VERSION) => Ok(()),
        _ => Err(AppError::UnsupportedVersion),
    }
}

/// `OPTIONS /api/upload`: protocol discovery.
pub async fn options(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            ("Tus-Resumable", TUS_VERSION.to_string()),
            ("Tus-Version", TUS_VERSION.to_string()),
            ("Tus-Extension", TUS_EXTENSIONS.to_string()),
            ("Tus-Max-Size", state.config.max_upload_size.to_string()),
        ],
    )
}

/// `POST /api/upload`: create an upload.
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    require_tus_version(&headers)?;

    let upload_length: i64 = headers
        .get(&UPLOAD_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            AppError::invalid_input("invalid_length", "Invalid or missing Upload-Length header")
        })?;

    if upload_length > state.config.max_upload_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds maximum size of {} bytes",
            state.config.max_upload_size
        ))
        .into());
    }

    let raw_metadata = headers
        .get("upload-metadata")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let metadata = parse_metadata(&raw_metadata);
    let filename = sanitize_filename(metadata.get("filename").map(String::as_str).unwrap_or(""));

    let upload_id = short_id(UPLOAD_ID_LENGTH);

    state
        .uploads
        .create(&NewUpload {
            id: upload_id.clone(),
            filename: Some(filename.clone()),
            file_size: Some(upload_length),
            metadata: Some(raw_metadata),
        })
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to create upload record");
            AppError::internal_with_code("create_failed", "Failed to create upload")
        })?;

    // Empty temp file up front so PATCH can append unconditionally.
    let path = temp_path(&state.config, &upload_id);
    if let Err(err) = tokio::fs::write(&path, b"").await {
        tracing::error!(error = %err, path = %path.display(), "failed to create temp file");
        let _ = state.uploads.delete(&upload_id).await;
        return Err(AppError::internal_with_code(
            "temp_file_failed",
            "Failed to create temporary file",
        )
        .into());
    }

    tracing::info!(
        upload_id = %upload_id,
        filename = %filename,
        size = upload_length,
        "upload created"
    );

    Ok((
        StatusCode::CREATED,
        [
            ("Location", format!("/api/upload/{upload_id}")),
            ("Tus-Resumable", TUS_VERSION.to_string()),
        ],
    )
        .into_response())
}

/// `HEAD /api/upload/{id}`: current offset and declared length.
pub async fn head(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    let upload = state
        .uploads
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;

    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(&TUS_RESUMABLE, TUS_VERSION.parse().expect("static header"));
    headers.insert(
        &UPLOAD_OFFSET,
        upload.offset.to_string().parse().expect("numeric header"),
    );
    if let Some(size) = upload.file_size {
        headers.insert(
            &UPLOAD_LENGTH,
            size.to_string().parse().expect("numeric header"),
        );
    }
    Ok(response)
}

/// `PATCH /api/upload/{id}`: append one chunk at the current offset.
pub async fn patch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HttpAppError> {
    require_tus_version(&headers)?;

    let upload = state
        .uploads
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;

    let client_offset: i64 = headers
        .get(&UPLOAD_OFFSET)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            AppError::invalid_input("invalid_offset", "Invalid Upload-Offset header")
        })?;

    // Cheap early rejection on an obviously stale offset.
    if client_offset != upload.offset {
        return Err(AppError::OffsetMismatch {
            current_offset: upload.offset,
        }
        .into());
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "application/offset+octet-stream" {
        return Err(AppError::InvalidChunkContentType.into());
    }

    // Claim the byte range first: the conditional UPDATE admits exactly
    // one writer per offset, so a racing duplicate of the final chunk
    // cannot complete the upload twice.
    let claimed = state
        .uploads
        .advance_offset(&id, client_offset, body.len() as i64)
        .await?;
    if !claimed {
        let current_offset = match state.uploads.get(&id).await? {
            Some(current) => current.offset,
            // The row is gone: a racing chunk finished the upload. Its
            // final offset is the declared size.
            None => upload.file_size.unwrap_or(upload.offset),
        };
        return Err(AppError::OffsetMismatch { current_offset }.into());
    }

    let path = temp_path(&state.config, &id);
    if let Err(err) = write_chunk_at(&path, client_offset as u64, &body).await {
        tracing::error!(error = %err, upload_id = %id, "failed to write chunk");
        // Give the claimed range back so the client can retry the chunk.
        if let Err(rollback) = state.uploads.update_offset(&id, client_offset).await {
            tracing::error!(error = %rollback, upload_id = %id, "offset rollback failed");
        }
        return Err(
            AppError::internal_with_code("write_failed", "Failed to write chunk").into(),
        );
    }

    let new_offset = client_offset + body.len() as i64;

    tracing::debug!(
        upload_id = %id,
        bytes = body.len(),
        new_offset,
        "chunk uploaded"
    );

    // Crossing the declared size completes the upload; the response does
    // not wait for the promotion to a file record.
    if upload.file_size.is_some_and(|size| new_offset >= size) {
        spawn_completion(state.clone(), upload);
    }

    Ok((
        StatusCode::NO_CONTENT,
        [
            ("Tus-Resumable", TUS_VERSION.to_string()),
            ("Upload-Offset", new_offset.to_string()),
        ],
    )
        .into_response())
}

/// `DELETE /api/upload/{id}`: cancel: temp file and row both go.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    state
        .uploads
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Upload not found".into()))?;

    let path = temp_path(&state.config, &id);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove temp file");
        }
    }
    state.uploads.delete(&id).await?;

    tracing::info!(upload_id = %id, "upload cancelled");

    Ok((
        StatusCode::NO_CONTENT,
        [("Tus-Resumable", TUS_VERSION.to_string())],
    )
        .into_response())
}

/// Promote a fully assembled upload into a file record.
///
/// Detached from the PATCH request that triggered it; tied to the process
/// lifetime via the active-upload gauge, which the shutdown drain waits
/// on. Temp file and upload row are removed on every exit path so no
/// partial state leaks.
pub fn spawn_completion(state: Arc<AppState>, upload: UploadRecord) {
    tokio::spawn(async move {
        let _transfer = state.collector.track_upload();
        let upload_id = upload.id.clone();

        tracing::info!(upload_id = %upload_id, "processing completed upload");

        let result =
            tokio::time::timeout(COMPLETION_TIMEOUT, complete_upload(&state, &upload)).await;
        match result {
            Ok(Ok(file_id)) => {
                tracing::info!(
                    upload_id = %upload_id,
                    file_id = %file_id,
                    "chunked upload completed"
                );
            }
            Ok(Err(err)) => {
                state.collector.record_upload_error();
                tracing::error!(error = %err, upload_id = %upload_id, "completion failed");
            }
            Err(_) => {
                state.collector.record_upload_error();
                tracing::error!(upload_id = %upload_id, "completion timed out");
            }
        }

        let path = temp_path(&state.config, &upload_id);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %err, path = %path.display(), "failed to remove temp file");
            }
        }
        if let Err(err) = state.uploads.delete(&upload_id).await {
            tracing::error!(error = %err, upload_id = %upload_id, "failed to remove upload row");
        }
    });
}

async fn complete_upload(state: &AppState, upload: &UploadRecord) -> Result<String, AppError> {
    if !state.wa.is_connected() {
        return Err(AppError::NotConnected);
    }

    let path = temp_path(&state.config, &upload.id);
    let data = tokio::fs::read(&path).await?;

    let file_hash = hash_file(&data);
    let metadata = parse_metadata(upload.metadata.as_deref().unwrap_or(""));
    let filename = sanitize_filename(metadata.get("filename").map(String::as_str).unwrap_or(""));
    let options = resolve_upload_options(
        &state.config,
        metadata.get("description").map(String::as_str),
        metadata.get("password").map(String::as_str),
        metadata.get("max_downloads").map(String::as_str),
        metadata.get("expires_in").map(String::as_str),
    )?;
    let mime_type = detect_mime(&data, None);

    let handle = state
        .wa
        .upload(&data, &mime_type)
        .await
        .map_err(|err| match err {
            AppError::NotConnected => AppError::NotConnected,
            other => AppError::upstream(
                "upload_failed",
                format!("Failed to upload file to storage: {other}"),
            ),
        })?;

    let file = state
        .files
        .create(&NewFile {
            id: short_id(state.config.short_id_length),
            filename,
            mime_type,
            file_size: data.len() as i64,
            file_hash,
            description: options.description,
            direct_path: handle.direct_path,
            media_key: handle.media_key,
            file_enc_hash: handle.file_enc_hash,
            file_sha256: Some(handle.file_sha256),
            password_hash: options.password_hash,
            max_downloads: options.max_downloads,
            expires_at: options.expires_at,
        })
        .await
        .map_err(|err| {
            AppError::internal_with_code("save_failed", format!("Failed to save file record: {err}"))
        })?;

    state.collector.record_upload(file.file_size);
    Ok(file.id)
}
