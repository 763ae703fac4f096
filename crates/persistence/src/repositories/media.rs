//! Media repository for database operations.

use sqlx::PgPool;

use crate::entities::MediaFileEntity;
use crate::metrics::QueryTimer;

/// Repository for media-file database operations.
#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    /// Creates a new MediaRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Register an uploaded media file.
    pub async fn register_media(
        &self,
        filename: &str,
        original_name: &str,
        content_type: &str,
        size_bytes: i64,
        cave_id: Option<i32>,
        uploaded_by: &str,
    ) -> Result<MediaFileEntity, sqlx::Error> {
        let timer = QueryTimer::new("register_media");
        let result = sqlx::query_as::<_, MediaFileEntity>(
            r#"
            INSERT INTO media_files (filename, original_name, content_type, size_bytes, cave_id, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, filename, original_name, content_type, size_bytes, cave_id, uploaded_by, uploaded_at
            "#,
        )
        .bind(filename)
        .bind(original_name)
        .bind(content_type)
        .bind(size_bytes)
        .bind(cave_id)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a media file by ID.
    pub async fn find_by_id(&self, id: i32) -> Result<Option<MediaFileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_media_by_id");
        let result = sqlx::query_as::<_, MediaFileEntity>(
            r#"
            SELECT id, filename, original_name, content_type, size_bytes, cave_id, uploaded_by, uploaded_at
            FROM media_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List media files for a cave.
    pub async fn list_for_cave(&self, cave_id: i32) -> Result<Vec<MediaFileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_media_for_cave");
        let result = sqlx::query_as::<_, MediaFileEntity>(
            r#"
            SELECT id, filename, original_name, content_type, size_bytes, cave_id, uploaded_by, uploaded_at
            FROM media_files
            WHERE cave_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(cave_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete one media file record.
    pub async fn delete_media(&self, id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_media");
        let result = sqlx::query("DELETE FROM media_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Delete a batch of media file records, returning the number of rows
    /// actually removed. Ids that no longer exist are skipped, so replaying
    /// a `cave.deleted` cascade is a no-op rather than a failure.
    pub async fn delete_media_batch(&self, ids: &[i32]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let timer = QueryTimer::new("delete_media_batch");
        let result = sqlx::query("DELETE FROM media_files WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    // Note: MediaRepository tests require a database connection and are
    // covered by integration tests.
}
