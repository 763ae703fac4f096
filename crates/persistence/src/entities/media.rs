//! Media entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::media::MediaFile;
use sqlx::FromRow;

/// Database row mapping for the media_files table.
#[derive(Debug, Clone, FromRow)]
pub struct MediaFileEntity {
    pub id: i32,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub cave_id: Option<i32>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<MediaFileEntity> for MediaFile {
    fn from(entity: MediaFileEntity) -> Self {
        Self {
            id: entity.id,
            filename: entity.filename,
            original_name: entity.original_name,
            content_type: entity.content_type,
            size_bytes: entity.size_bytes,
            cave_id: entity.cave_id,
            uploaded_by: entity.uploaded_by,
            uploaded_at: entity.uploaded_at,
        }
    }
}
