//! Stats endpoints (admin-only).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, DurationRound, Utc};
use serde::Deserialize;
use serde_json::json;
use whatsbox_db::FileStatus;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub days: Option<i64>,
}

/// `GET /api/admin/stats`: realtime counters plus a storage overview.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let realtime = state.collector.snapshot();

    let total_files = state.files.count(None).await?;
    let active_files = state.files.count(Some(FileStatus::Active)).await?;
    let expired_files = state.files.count(Some(FileStatus::Expired)).await?;
    let deleted_files = state.files.count(Some(FileStatus::Deleted)).await?;
    let total_bytes = state.files.total_active_size().await?;

    Ok(Json(json!({
        "realtime": realtime,
        "storage": {
            "total_files": total_files,
            "active_files": active_files,
            "expired_files": expired_files,
            "deleted_files": deleted_files,
            "total_bytes": total_bytes,
        },
    })))
}

/// `GET /api/admin/stats/hourly?hours=1..168`
pub async fn get_hourly(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HourlyQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let hours = match query.hours {
        Some(h) if (1..=168).contains(&h) => h,
        _ => 24,
    };

    let end = Utc::now()
        .duration_trunc(Duration::hours(1))
        .expect("hour truncation cannot fail")
        + Duration::hours(1);
    let start = end - Duration::hours(hours);

    let data = state.stats.hourly_range(start, end).await?;

    Ok(Json(json!({
        "period": {"start": start, "end": end, "hours": hours},
        "data": data,
    })))
}

/// `GET /api/admin/stats/daily?days=1..365`
pub async fn get_daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let days = match query.days {
        Some(d) if (1..=365).contains(&d) => d,
        _ => 30,
    };

    let end = Utc::now().date_naive() + Duration::days(1);
    let start = end - Duration::days(days);

    let data = state.stats.daily_range(start, end).await?;

    Ok(Json(json!({
        "period": {"start": start, "end": end, "days": days},
        "data": data,
    })))
}
