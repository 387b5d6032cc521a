//! Append-only access audit log.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use whatsbox_core::AppError;

/// Audited actions. Stored as their lowercase snake_case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    Download,
    PasswordFail,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Download => "download",
            AccessAction::PasswordFail => "password_fail",
        }
    }
}

#[derive(Clone)]
pub struct AccessLogRepository {
    pool: SqlitePool,
}

impl AccessLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        file_id: &str,
        action: AccessAction,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO access_log (file_id, action, ip_address, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(file_id)
        .bind(action.as_str())
        .bind(ip_address)
        .bind(user_agent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_for_file(&self, file_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_log WHERE file_id = ?1")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_for_file_action(
        &self,
        file_id: &str,
        action: AccessAction,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM access_log WHERE file_id = ?1 AND action = ?2",
        )
        .bind(file_id)
        .bind(action.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Trim rows past the retention window. Returns the number removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM access_log WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
