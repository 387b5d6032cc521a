//! Resumable-upload repository.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use whatsbox_core::AppError;

use crate::models::UploadRecord;

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub id: String,
    pub filename: Option<String>,
    pub file_size: Option<i64>,
    pub metadata: Option<String>,
}

#[derive(Clone)]
pub struct UploadRepository {
    pool: SqlitePool,
}

impl UploadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, upload: &NewUpload) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO uploads (id, filename, file_size, offset, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)
            "#,
        )
        .bind(&upload.id)
        .bind(&upload.filename)
        .bind(upload.file_size)
        .bind(&upload.metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<UploadRecord>, AppError> {
        let row = sqlx::query_as::<_, UploadRecord>(
            r#"
            SELECT id, filename, file_size, offset, metadata, created_at, updated_at
            FROM uploads WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_offset(&self, id: &str, offset: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE uploads SET offset = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(offset)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically advance the offset, but only from `expected`. Returns
    /// false when the stored offset differs, i.e. a concurrent or replayed
    /// chunk already claimed this range.
    pub async fn advance_offset(
        &self,
        id: &str,
        expected: i64,
        delta: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE uploads SET offset = offset + ?1, updated_at = ?2 WHERE id = ?3 AND offset = ?4",
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM uploads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Purge abandoned uploads. Returns the number of rows removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM uploads WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(id: &str) -> NewUpload {
        NewUpload {
            id: id.to_string(),
            filename: Some("video.mp4".into()),
            file_size: Some(1000),
            metadata: Some("filename dmlkZW8ubXA0".into()),
        }
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let repo = UploadRepository::new(crate::test_pool().await);
        repo.create(&sample("upAAAAAAAAAA")).await.unwrap();

        let upload = repo.get("upAAAAAAAAAA").await.unwrap().unwrap();
        assert_eq!(upload.offset, 0);
        assert_eq!(upload.file_size, Some(1000));

        repo.update_offset("upAAAAAAAAAA", 512).await.unwrap();
        let upload = repo.get("upAAAAAAAAAA").await.unwrap().unwrap();
        assert_eq!(upload.offset, 512);
        assert!(upload.updated_at >= upload.created_at);

        repo.delete("upAAAAAAAAAA").await.unwrap();
        assert!(repo.get("upAAAAAAAAAA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn advance_offset_claims_exactly_once() {
        let repo = UploadRepository::new(crate::test_pool().await);
        repo.create(&sample("upCCCCCCCCCC")).await.unwrap();

        assert!(repo.advance_offset("upCCCCCCCCCC", 0, 4).await.unwrap());
        // A replay with the stale offset loses.
        assert!(!repo.advance_offset("upCCCCCCCCCC", 0, 4).await.unwrap());
        assert!(repo.advance_offset("upCCCCCCCCCC", 4, 6).await.unwrap());

        let upload = repo.get("upCCCCCCCCCC").await.unwrap().unwrap();
        assert_eq!(upload.offset, 10);
    }

    #[tokio::test]
    async fn delete_older_than_only_hits_stale_rows() {
        let repo = UploadRepository::new(crate::test_pool().await);
        repo.create(&sample("upBBBBBBBBBB")).await.unwrap();

        // Nothing is older than 24h yet.
        let removed = repo
            .delete_older_than(Utc::now() - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        // A future cutoff sweeps the fresh row.
        let removed = repo
            .delete_older_than(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
