//! Time-bucketed stats repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use whatsbox_core::AppError;

use crate::models::{StatsDailyRow, StatsHourlyRow};

#[derive(Clone)]
pub struct StatsRepository {
    pool: SqlitePool,
}

impl StatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Accumulate a flush delta into its hourly bucket. The UPSERT adds
    /// each column to any existing row, so flushing N times within one
    /// hour leaves the bucket holding the element-wise sum of the deltas.
    pub async fn add_hourly(&self, bucket: &StatsHourlyRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stats_hourly
                (hour, uploads, downloads, upload_bytes, download_bytes,
                 failed_uploads, failed_downloads, requests)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(hour) DO UPDATE SET
                uploads = uploads + excluded.uploads,
                downloads = downloads + excluded.downloads,
                upload_bytes = upload_bytes + excluded.upload_bytes,
                download_bytes = download_bytes + excluded.download_bytes,
                failed_uploads = failed_uploads + excluded.failed_uploads,
                failed_downloads = failed_downloads + excluded.failed_downloads,
                requests = requests + excluded.requests
            "#,
        )
        .bind(bucket.hour)
        .bind(bucket.uploads)
        .bind(bucket.downloads)
        .bind(bucket.upload_bytes)
        .bind(bucket.download_bytes)
        .bind(bucket.failed_uploads)
        .bind(bucket.failed_downloads)
        .bind(bucket.requests)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn hourly_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StatsHourlyRow>, AppError> {
        let rows = sqlx::query_as::<_, StatsHourlyRow>(
            r#"
            SELECT hour, uploads, downloads, upload_bytes, download_bytes,
                   failed_uploads, failed_downloads, requests
            FROM stats_hourly
            WHERE hour >= ?1 AND hour < ?2
            ORDER BY hour
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn daily_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StatsDailyRow>, AppError> {
        let rows = sqlx::query_as::<_, StatsDailyRow>(
            r#"
            SELECT date, uploads, downloads, upload_bytes, download_bytes
            FROM stats_daily
            WHERE date >= ?1 AND date < ?2
            ORDER BY date
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Roll one day's hourly buckets up into its daily row. Recomputing
    /// from the hourly source makes the rollup idempotent, so the daily
    /// row is overwritten rather than accumulated.
    pub async fn aggregate_daily(&self, day: NaiveDate) -> Result<(), AppError> {
        let start = day.and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let end = start + chrono::Duration::days(1);

        sqlx::query(
            r#"
            INSERT INTO stats_daily (date, uploads, downloads, upload_bytes, download_bytes)
            SELECT ?1,
                   COALESCE(SUM(uploads), 0),
                   COALESCE(SUM(downloads), 0),
                   COALESCE(SUM(upload_bytes), 0),
                   COALESCE(SUM(download_bytes), 0)
            FROM stats_hourly
            WHERE hour >= ?2 AND hour < ?3
            ON CONFLICT(date) DO UPDATE SET
                uploads = excluded.uploads,
                downloads = excluded.downloads,
                upload_bytes = excluded.upload_bytes,
                download_bytes = excluded.download_bytes
            "#,
        )
        .bind(day)
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop hourly buckets past the retention window.
    pub async fn delete_hourly_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM stats_hourly WHERE hour < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
