//! Client for the group service's internal endpoints.

use domain::models::group::MembershipResponse;
use serde::Deserialize;
use tracing::warn;

use super::service_client::{urlencode, ServiceClient, ServiceClientError};

/// Inheritance decision as served by the group service.
#[derive(Debug, Clone, Deserialize)]
pub struct InheritanceDecision {
    pub action: String,
    #[serde(default)]
    pub inherit_email: Option<String>,
}

/// Typed client for group-service calls.
#[derive(Clone)]
pub struct GroupServiceClient {
    inner: ServiceClient,
}

impl GroupServiceClient {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            inner: ServiceClient::new("group-service", base_url, service_token, timeout_secs),
        }
    }

    /// Ask who inherits a cave when its current owner goes away.
    pub async fn cave_inheritance(
        &self,
        cave_id: i32,
        current_owner_email: &str,
    ) -> Result<InheritanceDecision, ServiceClientError> {
        let path = format!(
            "/groups/caves/{}/inheritance?current_owner_email={}",
            cave_id,
            urlencode(current_owner_email)
        );
        self.inner.get_json(&path).await
    }

    /// Remove every assignment referencing a cave. Best-effort: failures are
    /// logged by the caller and do not undo the cave deletion.
    pub async fn delete_cave_assignments(&self, cave_id: i32) -> Result<(), ServiceClientError> {
        self.inner
            .delete(&format!("/caves/{}/assignments", cave_id))
            .await
            .map(|_| ())
    }

    /// Probe a user's membership in the group a cave is assigned to.
    pub async fn cave_membership(
        &self,
        cave_id: i32,
        user_email: &str,
    ) -> Result<MembershipResponse, ServiceClientError> {
        let path = format!(
            "/caves/{}/membership/{}",
            cave_id,
            urlencode(user_email)
        );
        match self.inner.get_json(&path).await {
            Ok(membership) => Ok(membership),
            Err(e @ ServiceClientError::Status { .. }) => {
                // A definite answer from the sibling: treat as not a member.
                warn!(cave_id = cave_id, error = %e, "Membership probe returned error status");
                Ok(MembershipResponse {
                    is_member: false,
                    role: None,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inheritance_decision_decodes_transfer() {
        let decision: InheritanceDecision =
            serde_json::from_str(r#"{"action":"transfer","inherit_email":"heir@x.com"}"#).unwrap();
        assert_eq!(decision.action, "transfer");
        assert_eq!(decision.inherit_email.as_deref(), Some("heir@x.com"));
    }

    #[test]
    fn test_inheritance_decision_decodes_delete_without_email() {
        let decision: InheritanceDecision =
            serde_json::from_str(r#"{"action":"delete"}"#).unwrap();
        assert_eq!(decision.action, "delete");
        assert!(decision.inherit_email.is_none());
    }
}
