//! File endpoints: one-shot upload, metadata, download, list, delete.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use whatsbox_core::{filename::sanitize_filename, hash_file, ids::short_id, AppError};
use whatsbox_db::{AccessAction, DownloadCounter, FileStatus, NewFile};
use whatsbox_wa::DownloadRequest;

use crate::error::HttpAppError;
use crate::handlers::{
    client_ip, detect_mime, resolve_upload_options, user_agent, FileResponse,
};
use crate::state::AppState;

/// Upstream transfers on the request path are bounded; the resumable
/// completion task has its own, longer budget.
const TRANSFER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct UploadForm {
    data: Option<Vec<u8>>,
    filename: Option<String>,
    content_type: Option<String>,
    description: Option<String>,
    password: Option<String>,
    max_downloads: Option<String>,
    expires_in: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        AppError::invalid_input("invalid_multipart", format!("Failed to read multipart: {err}"))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.filename = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::invalid_input(
                        "invalid_multipart",
                        format!("Failed to read file data: {err}"),
                    )
                })?;
                form.data = Some(bytes.to_vec());
            }
            "description" => form.description = field.text().await.ok(),
            "password" => form.password = field.text().await.ok(),
            "max_downloads" => form.max_downloads = field.text().await.ok(),
            "expires_in" => form.expires_in = field.text().await.ok(),
            _ => {}
        }
    }

    Ok(form)
}

/// `POST /api/files`: one-shot multipart upload.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.wa.is_connected() {
        return Err(AppError::NotConnected.into());
    }

    let _transfer = state.collector.track_upload();

    let form = read_upload_form(multipart).await?;
    let data = form
        .data
        .ok_or_else(|| AppError::invalid_input("missing_file", "No file provided"))?;

    // Size gate fires before any upstream work.
    if data.len() as i64 > state.config.max_upload_size {
        state.collector.record_upload_error();
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds maximum size of {} bytes",
            state.config.max_upload_size
        ))
        .into());
    }

    let filename = sanitize_filename(form.filename.as_deref().unwrap_or(""));
    let file_hash = hash_file(&data);
    let options = resolve_upload_options(
        &state.config,
        form.description.as_deref(),
        form.password.as_deref(),
        form.max_downloads.as_deref(),
        form.expires_in.as_deref(),
    )?;
    let mime_type = detect_mime(&data, form.content_type.as_deref());

    let handle = tokio::time::timeout(TRANSFER_TIMEOUT, state.wa.upload(&data, &mime_type))
        .await
        .unwrap_or_else(|_| {
            Err(AppError::upstream(
                "upload_failed",
                "Timed out uploading file to storage",
            ))
        })
        .map_err(|err| {
            state.collector.record_upload_error();
            match err {
                AppError::NotConnected => AppError::NotConnected,
                other @ AppError::Upstream { .. } => other,
                other => AppError::upstream(
                    "upload_failed",
                    format!("Failed to upload file to storage: {other}"),
                ),
            }
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
            state.collector.record_upload_error();
            tracing::error!(error = %err, "failed to save file record");
            AppError::internal_with_code("save_failed", "Failed to save file record")
        })?;

    state.collector.record_upload(file.file_size);
    tracing::info!(
        file_id = %file.id,
        filename = %file.filename,
        size = file.file_size,
        "file uploaded"
    );

    Ok((StatusCode::CREATED, Json(FileResponse::from(&file))))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/files` (admin): newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);

    let files = state.files.list(limit, offset).await?;
    let responses: Vec<FileResponse> = files.iter().map(FileResponse::from).collect();

    Ok(Json(json!({
        "files": responses,
        "limit": limit,
        "offset": offset,
        "count": responses.len(),
    })))
}

/// `GET /api/files/{id}`: public metadata.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = state
        .files
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    Ok(Json(FileResponse::from(&file)))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
}

/// `GET /api/files/{id}/download`
///
/// Ordered, short-circuiting policy gate; see the cap-check note below
/// for why the counter update happens after the upstream fetch.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let file = state
        .files
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    // Wall-clock expiry gates even before the janitor has flipped status.
    if file.status == FileStatus::Expired || Utc::now() >= file.expires_at {
        return Err(AppError::gone(
            "file_expired",
            "This file has expired and is no longer available",
        )
        .into());
    }

    if file.status == FileStatus::Deleted {
        return Err(AppError::gone("file_deleted", "This file has been deleted").into());
    }

    if let Some(password_hash) = &file.password_hash {
        let supplied = headers
            .get("x-password")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| query.password.clone())
            .unwrap_or_default();

        if supplied.is_empty() {
            return Err(AppError::unauthorized(
                "password_required",
                "This file is password protected. Provide password via X-Password header or password query parameter.",
            )
            .into());
        }

        if !bcrypt::verify(&supplied, password_hash).unwrap_or(false) {
            if let Err(err) = state
                .access_log
                .record(
                    &id,
                    AccessAction::PasswordFail,
                    client_ip(&headers).as_deref(),
                    user_agent(&headers).as_deref(),
                )
                .await
            {
                tracing::warn!(error = %err, file_id = %id, "failed to log password failure");
            }
            return Err(AppError::unauthorized("invalid_password", "Incorrect password").into());
        }
    }

    if !state.wa.is_connected() {
        return Err(AppError::NotConnected.into());
    }

    let _transfer = state.collector.track_download();

    let request = DownloadRequest {
        direct_path: file.direct_path.clone(),
        media_key: file.media_key.clone(),
        file_enc_hash: file.file_enc_hash.clone(),
        file_sha256: file.file_sha256.clone(),
        file_length: file.file_size as u64,
        mime_type: file.mime_type.clone(),
    };
    let data = tokio::time::timeout(TRANSFER_TIMEOUT, state.wa.download(&request))
        .await
        .unwrap_or_else(|_| {
            Err(AppError::upstream(
                "download_failed",
                "Timed out downloading file from storage",
            ))
        })
        .map_err(|err| {
            state.collector.record_download_error();
            match err {
                AppError::NotConnected => AppError::NotConnected,
                other @ AppError::Upstream { .. } => other,
                other => AppError::upstream(
                    "download_failed",
                    format!("Failed to download file from storage: {other}"),
                ),
            }
        })?;

    // The cap is enforced after the fetch but before the send: the
    // conditional UPDATE serializes concurrent downloaders at the store,
    // so only the first N succeed, at the cost of one wasted upstream
    // fetch on the losing racer.
    if state.files.increment_download_count(&id).await? == DownloadCounter::LimitReached {
        return Err(AppError::gone(
            "download_limit_reached",
            "This file has reached its maximum download count",
        )
        .into());
    }

    if let Err(err) = state
        .access_log
        .record(
            &id,
            AccessAction::Download,
            client_ip(&headers).as_deref(),
            user_agent(&headers).as_deref(),
        )
        .await
    {
        tracing::warn!(error = %err, file_id = %id, "failed to log download");
    }

    state.collector.record_download(file.file_size);
    tracing::info!(file_id = %id, "file downloaded");

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, file.file_size.to_string()),
        ],
        data,
    )
        .into_response())
}

/// `DELETE /api/files/{id}` (admin): soft delete.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = state
        .files
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    if file.status == FileStatus::Deleted {
        return Err(AppError::conflict("already_deleted", "File has already been deleted").into());
    }

    state.files.soft_delete(&id).await?;
    tracing::info!(file_id = %id, "file deleted");

    Ok(Json(json!({"message": "File deleted successfully", "id": id})))
}
