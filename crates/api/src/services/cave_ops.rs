//! Cave lifecycle operations.
//!
//! Deletion is the interesting path: the local row removal commits first,
//! then other services are notified best-effort over the broker. A broker
//! outage never rolls back or blocks the deletion.

use std::sync::Arc;

use domain::models::event::{CaveDeletedEvent, CAVE_DELETED};
use messaging::EventPublisher;
use persistence::repositories::cave::DeletedCave;
use persistence::repositories::CaveRepository;
use tracing::{error, info, warn};

use crate::clients::GroupServiceClient;

/// Cave operations shared by the HTTP routes and the event handlers.
pub struct CaveOps {
    repo: CaveRepository,
    publisher: Arc<EventPublisher>,
    group_client: Arc<GroupServiceClient>,
}

impl CaveOps {
    pub fn new(
        repo: CaveRepository,
        publisher: Arc<EventPublisher>,
        group_client: Arc<GroupServiceClient>,
    ) -> Self {
        Self {
            repo,
            publisher,
            group_client,
        }
    }

    pub fn repo(&self) -> &CaveRepository {
        &self.repo
    }

    /// Delete a cave and notify other services.
    ///
    /// Returns false when the cave was already gone. The deletion commits
    /// before any notification goes out; publish failures are logged and
    /// swallowed.
    pub async fn delete_cave_and_notify(&self, cave_id: i32) -> Result<bool, sqlx::Error> {
        let Some(deleted) = self.repo.delete_cave(cave_id).await? else {
            warn!(cave_id = cave_id, "Cave not found for deletion");
            return Ok(false);
        };

        info!(
            cave_id = cave_id,
            cave_name = %deleted.cave.name,
            media_files = deleted.media_file_ids.len(),
            "Deleted cave"
        );

        notify_cave_deleted(&self.publisher, &deleted).await;
        Ok(true)
    }

    /// React to a `user.deleted` event: resolve inheritance for every cave
    /// the user owned.
    ///
    /// Each cave is handled independently; a failed inheritance query for
    /// one cave is logged and does not stop the rest.
    pub async fn handle_user_deleted(&self, user_email: &str) -> Result<(), sqlx::Error> {
        let caves = self.repo.find_owned_by(user_email).await?;
        if caves.is_empty() {
            info!(user_email = user_email, "No caves owned by deleted user");
            return Ok(());
        }

        info!(
            user_email = user_email,
            caves = caves.len(),
            "Resolving cave ownership for deleted user"
        );

        for cave in caves {
            if let Err(e) = self.resolve_single_cave(cave.cave_id, user_email).await {
                error!(
                    cave_id = cave.cave_id,
                    error = %e,
                    "Failed to resolve cave inheritance"
                );
            }
        }
        Ok(())
    }

    async fn resolve_single_cave(
        &self,
        cave_id: i32,
        user_email: &str,
    ) -> Result<(), anyhow::Error> {
        let decision = self
            .group_client
            .cave_inheritance(cave_id, user_email)
            .await?;

        info!(
            cave_id = cave_id,
            action = %decision.action,
            inherit_email = decision.inherit_email.as_deref().unwrap_or("-"),
            "Inheritance decision received"
        );

        match (decision.action.as_str(), decision.inherit_email) {
            ("transfer", Some(inherit_email)) => {
                self.repo.transfer_ownership(cave_id, &inherit_email).await?;
                info!(cave_id = cave_id, new_owner = %inherit_email, "Transferred cave ownership");
            }
            ("delete", _) => {
                self.delete_cave_and_notify(cave_id).await?;
                // The cave.deleted event already drives assignment cleanup;
                // the direct call covers consumers that missed it and is
                // idempotent on the other side.
                if let Err(e) = self.group_client.delete_cave_assignments(cave_id).await {
                    warn!(cave_id = cave_id, error = %e, "Assignment cleanup call failed");
                }
            }
            (action, _) => {
                warn!(cave_id = cave_id, action = action, "Unrecognized inheritance action");
            }
        }
        Ok(())
    }
}

/// Publish `cave.deleted` for an already-committed deletion, swallowing any
/// broker failure.
pub async fn notify_cave_deleted(publisher: &EventPublisher, deleted: &DeletedCave) {
    let event = CaveDeletedEvent::new(
        deleted.cave.cave_id,
        deleted.cave.name.clone(),
        deleted.cave.owner_email.clone(),
        deleted.media_file_ids.clone(),
    );

    match publisher.publish(CAVE_DELETED, &event).await {
        Ok(()) => info!(
            cave_id = deleted.cave.cave_id,
            media_files = deleted.media_file_ids.len(),
            "Published cave.deleted event"
        ),
        // The row is gone and stays gone; fan-out is best-effort.
        Err(e) => error!(
            cave_id = deleted.cave.cave_id,
            error = %e,
            "Failed to publish cave.deleted event"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use persistence::entities::CaveEntity;

    fn deleted_cave() -> DeletedCave {
        DeletedCave {
            cave: CaveEntity {
                cave_id: 7,
                name: "Wind Cave".to_string(),
                description: None,
                owner_email: "owner@example.com".to_string(),
                latitude: 43.6,
                longitude: -103.4,
                depth_m: None,
                length_m: None,
                discovered_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            media_file_ids: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        // The broker at port 1 refuses connections; the notification must
        // complete anyway because the deletion has already committed. The
        // row-is-still-gone half of this property is covered by the
        // repository integration tests.
        let publisher = EventPublisher::new("amqp://127.0.0.1:1", "cave.events");
        notify_cave_deleted(&publisher, &deleted_cave()).await;
    }
}
