//! Media file domain models.
//!
//! Media blobs live in external object storage; this service tracks the
//! metadata rows and their association to caves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A stored media file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaFile {
    pub id: i32,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub cave_id: Option<i32>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Request payload for registering an uploaded media file.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterMediaRequest {
    #[validate(length(
        min = 1,
        max = 512,
        message = "Filename must be between 1 and 512 characters"
    ))]
    pub filename: String,

    #[validate(length(
        min = 1,
        max = 512,
        message = "Original name must be between 1 and 512 characters"
    ))]
    pub original_name: String,

    #[validate(length(min = 1, max = 255))]
    pub content_type: String,

    #[validate(range(min = 0))]
    pub size_bytes: i64,

    pub cave_id: Option<i32>,
}

/// Media listing response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MediaListResponse {
    pub data: Vec<MediaFile>,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_media_request_validation() {
        let valid = RegisterMediaRequest {
            filename: "a1b2c3.jpg".to_string(),
            original_name: "entrance.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size_bytes: 1024,
            cave_id: Some(7),
        };
        assert!(valid.validate().is_ok());

        let negative_size = RegisterMediaRequest {
            size_bytes: -1,
            ..valid
        };
        assert!(negative_size.validate().is_err());
    }
}
