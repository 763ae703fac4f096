//! Cave repository for database operations.

use sqlx::PgPool;

use crate::entities::{CaveEntity, CaveEntranceEntity};
use crate::metrics::QueryTimer;

/// A deleted cave row together with the media ids that were associated to
/// it, captured before the cascade removed the association rows.
#[derive(Debug, Clone)]
pub struct DeletedCave {
    pub cave: CaveEntity,
    pub media_file_ids: Vec<i32>,
}

/// Repository for cave-related database operations.
#[derive(Clone)]
pub struct CaveRepository {
    pool: PgPool,
}

impl CaveRepository {
    /// Creates a new CaveRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new cave owned by `owner_email`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_cave(
        &self,
        name: &str,
        description: Option<&str>,
        owner_email: &str,
        latitude: f64,
        longitude: f64,
        depth_m: Option<f64>,
        length_m: Option<f64>,
        discovered_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<CaveEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_cave");
        let result = sqlx::query_as::<_, CaveEntity>(
            r#"
            INSERT INTO caves (name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(owner_email)
        .bind(latitude)
        .bind(longitude)
        .bind(depth_m)
        .bind(length_m)
        .bind(discovered_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a cave by ID.
    pub async fn find_by_id(&self, cave_id: i32) -> Result<Option<CaveEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_cave_by_id");
        let result = sqlx::query_as::<_, CaveEntity>(
            r#"
            SELECT cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            FROM caves
            WHERE cave_id = $1
            "#,
        )
        .bind(cave_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List caves, newest first.
    pub async fn list_caves(&self, limit: i64, offset: i64) -> Result<Vec<CaveEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_caves");
        let result = sqlx::query_as::<_, CaveEntity>(
            r#"
            SELECT cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            FROM caves
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find all caves owned by a user.
    pub async fn find_owned_by(&self, owner_email: &str) -> Result<Vec<CaveEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_caves_owned_by");
        let result = sqlx::query_as::<_, CaveEntity>(
            r#"
            SELECT cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            FROM caves
            WHERE owner_email = $1
            ORDER BY cave_id
            "#,
        )
        .bind(owner_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Update a cave.
    pub async fn update_cave(
        &self,
        cave_id: i32,
        name: Option<&str>,
        description: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        depth_m: Option<f64>,
        length_m: Option<f64>,
    ) -> Result<CaveEntity, sqlx::Error> {
        let timer = QueryTimer::new("update_cave");
        let result = sqlx::query_as::<_, CaveEntity>(
            r#"
            UPDATE caves
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                latitude = COALESCE($4, latitude),
                longitude = COALESCE($5, longitude),
                depth_m = COALESCE($6, depth_m),
                length_m = COALESCE($7, length_m),
                updated_at = NOW()
            WHERE cave_id = $1
            RETURNING cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            "#,
        )
        .bind(cave_id)
        .bind(name)
        .bind(description)
        .bind(latitude)
        .bind(longitude)
        .bind(depth_m)
        .bind(length_m)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Transfer ownership of a cave to another user.
    pub async fn transfer_ownership(
        &self,
        cave_id: i32,
        new_owner_email: &str,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("transfer_cave_ownership");
        let result = sqlx::query(
            r#"
            UPDATE caves
            SET owner_email = $2, updated_at = NOW()
            WHERE cave_id = $1
            "#,
        )
        .bind(cave_id)
        .bind(new_owner_email)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Delete a cave, returning the row and its associated media ids.
    ///
    /// Entrance and media-association rows cascade with the cave. Returns
    /// `None` when the cave is already gone, so a repeated deletion (for
    /// example a redelivered event) is a no-op rather than an error.
    pub async fn delete_cave(&self, cave_id: i32) -> Result<Option<DeletedCave>, sqlx::Error> {
        let timer = QueryTimer::new("delete_cave");

        let mut tx = self.pool.begin().await?;

        let cave = sqlx::query_as::<_, CaveEntity>(
            r#"
            SELECT cave_id, name, description, owner_email, latitude, longitude, depth_m, length_m, discovered_at, created_at, updated_at
            FROM caves
            WHERE cave_id = $1
            "#,
        )
        .bind(cave_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(cave) = cave else {
            timer.record();
            return Ok(None);
        };

        // Captured before the delete removes the association rows.
        let media_file_ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT media_file_id FROM cave_media WHERE cave_id = $1 ORDER BY media_file_id
            "#,
        )
        .bind(cave_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM caves WHERE cave_id = $1")
            .bind(cave_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();

        Ok(Some(DeletedCave {
            cave,
            media_file_ids,
        }))
    }

    /// List entrances of a cave.
    pub async fn list_entrances(
        &self,
        cave_id: i32,
    ) -> Result<Vec<CaveEntranceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_cave_entrances");
        let result = sqlx::query_as::<_, CaveEntranceEntity>(
            r#"
            SELECT entrance_id, cave_id, name, latitude, longitude, elevation_m
            FROM cave_entrances
            WHERE cave_id = $1
            ORDER BY entrance_id
            "#,
        )
        .bind(cave_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Add an entrance to a cave.
    pub async fn add_entrance(
        &self,
        cave_id: i32,
        name: Option<&str>,
        latitude: f64,
        longitude: f64,
        elevation_m: Option<f64>,
    ) -> Result<CaveEntranceEntity, sqlx::Error> {
        let timer = QueryTimer::new("add_cave_entrance");
        let result = sqlx::query_as::<_, CaveEntranceEntity>(
            r#"
            INSERT INTO cave_entrances (cave_id, name, latitude, longitude, elevation_m)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING entrance_id, cave_id, name, latitude, longitude, elevation_m
            "#,
        )
        .bind(cave_id)
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .bind(elevation_m)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Remove an entrance from a cave.
    pub async fn delete_entrance(
        &self,
        cave_id: i32,
        entrance_id: i32,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_cave_entrance");
        let result = sqlx::query(
            r#"
            DELETE FROM cave_entrances WHERE cave_id = $1 AND entrance_id = $2
            "#,
        )
        .bind(cave_id)
        .bind(entrance_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Media ids associated with a cave.
    pub async fn media_file_ids(&self, cave_id: i32) -> Result<Vec<i32>, sqlx::Error> {
        let timer = QueryTimer::new("cave_media_file_ids");
        let result = sqlx::query_scalar(
            r#"
            SELECT media_file_id FROM cave_media WHERE cave_id = $1 ORDER BY media_file_id
            "#,
        )
        .bind(cave_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Associate a media file with a cave. Idempotent.
    pub async fn attach_media(&self, cave_id: i32, media_file_id: i32) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("attach_cave_media");
        sqlx::query(
            r#"
            INSERT INTO cave_media (cave_id, media_file_id)
            VALUES ($1, $2)
            ON CONFLICT (cave_id, media_file_id) DO NOTHING
            "#,
        )
        .bind(cave_id)
        .bind(media_file_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Note: CaveRepository tests require a database connection and are
    // covered by integration tests.
}
