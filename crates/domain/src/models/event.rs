//! Event envelopes exchanged over the message broker.
//!
//! Field names are wire-exact: sibling services (including the external
//! identity service) serialize these payloads with camelCase keys, and the
//! `event` discriminator doubles as the routing key.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Routing key and `event` field value for cave deletions.
pub const CAVE_DELETED: &str = "cave.deleted";

/// Routing key and `event` field value for user deletions.
pub const USER_DELETED: &str = "user.deleted";

/// Topic exchange carrying cave lifecycle events.
pub const CAVE_EVENTS_EXCHANGE: &str = "cave.events";

/// Topic exchange carrying user lifecycle events.
pub const USER_EVENTS_EXCHANGE: &str = "user.events";

/// Published when a cave row has been deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaveDeletedEvent {
    pub event: String,
    pub cave_id: i32,
    pub cave_name: String,
    pub owner_email: String,
    #[serde(default)]
    pub media_file_ids: Vec<i32>,
    /// Epoch seconds at publish time.
    pub timestamp: f64,
}

impl CaveDeletedEvent {
    pub fn new(cave_id: i32, cave_name: String, owner_email: String, media_file_ids: Vec<i32>) -> Self {
        Self {
            event: CAVE_DELETED.to_string(),
            cave_id,
            cave_name,
            owner_email,
            media_file_ids,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Published by the identity service when a user account is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedEvent {
    pub event: String,
    pub email: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cave_deleted_wire_shape() {
        let event = CaveDeletedEvent::new(
            12,
            "Lost River Cave".to_string(),
            "owner@example.com".to_string(),
            vec![3, 5],
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "cave.deleted");
        assert_eq!(value["caveId"], 12);
        assert_eq!(value["caveName"], "Lost River Cave");
        assert_eq!(value["ownerEmail"], "owner@example.com");
        assert_eq!(value["mediaFileIds"][0], 3);
        assert_eq!(value["mediaFileIds"][1], 5);
        assert!(value["timestamp"].is_f64());
    }

    #[test]
    fn test_user_deleted_decodes_without_user_id() {
        let event: UserDeletedEvent =
            serde_json::from_str(r#"{"event":"user.deleted","email":"gone@example.com"}"#).unwrap();
        assert_eq!(event.email, "gone@example.com");
        assert!(event.user_id.is_none());
    }

    #[test]
    fn test_user_deleted_decodes_camel_case_user_id() {
        let event: UserDeletedEvent = serde_json::from_str(
            r#"{"event":"user.deleted","email":"gone@example.com","userId":"u-99"}"#,
        )
        .unwrap();
        assert_eq!(event.user_id.as_deref(), Some("u-99"));
    }

    #[test]
    fn test_cave_deleted_media_ids_default_empty() {
        let event: CaveDeletedEvent = serde_json::from_str(
            r#"{"event":"cave.deleted","caveId":1,"caveName":"A","ownerEmail":"o@x.com","timestamp":1.5}"#,
        )
        .unwrap();
        assert!(event.media_file_ids.is_empty());
    }
}
