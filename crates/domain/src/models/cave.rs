//! Cave domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::{validate_latitude, validate_longitude, validate_measurement};
use validator::Validate;

/// A surveyed cave record, owned by exactly one user at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Cave {
    pub cave_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub owner_email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: Option<f64>,
    pub length_m: Option<f64>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A surveyed entrance of a cave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaveEntrance {
    pub entrance_id: i32,
    pub cave_id: i32,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
}

/// Request payload for creating a cave.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateCaveRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(max = 4000, message = "Description must be at most 4000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "validate_measurement"))]
    pub depth_m: Option<f64>,

    #[validate(custom(function = "validate_measurement"))]
    pub length_m: Option<f64>,

    pub discovered_at: Option<DateTime<Utc>>,
}

/// Request payload for updating a cave.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateCaveRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,

    #[validate(length(max = 4000, message = "Description must be at most 4000 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_latitude"))]
    pub latitude: Option<f64>,

    #[validate(custom(function = "validate_longitude"))]
    pub longitude: Option<f64>,

    #[validate(custom(function = "validate_measurement"))]
    pub depth_m: Option<f64>,

    #[validate(custom(function = "validate_measurement"))]
    pub length_m: Option<f64>,
}

/// Request payload for adding an entrance to a cave.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateEntranceRequest {
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "validate_longitude"))]
    pub longitude: f64,

    pub elevation_m: Option<f64>,
}

/// Cave detail response with entrances and associated media ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CaveDetail {
    pub cave_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub owner_email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_m: Option<f64>,
    pub length_m: Option<f64>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub entrances: Vec<CaveEntrance>,
    pub media_file_ids: Vec<i32>,
}

/// Permission probe answer for sibling services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CavePermissionResponse {
    pub can_edit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateCaveRequest {
        CreateCaveRequest {
            name: "Postojna".to_string(),
            description: None,
            latitude: 45.783,
            longitude: 14.204,
            depth_m: Some(115.0),
            length_m: Some(24_340.0),
            discovered_at: None,
        }
    }

    #[test]
    fn test_create_cave_request_valid() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_create_cave_request_rejects_bad_latitude() {
        let mut req = valid_request();
        req.latitude = 95.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_cave_request_rejects_negative_depth() {
        let mut req = valid_request();
        req.depth_m = Some(-3.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_permission_response_serialization() {
        let json = serde_json::to_string(&CavePermissionResponse { can_edit: true }).unwrap();
        assert_eq!(json, "{\"can_edit\":true}");
    }
}
