//! Client for the cave service's internal endpoints.

use domain::models::cave::CavePermissionResponse;
use serde::Deserialize;
use tracing::warn;

use super::service_client::{urlencode, ServiceClient, ServiceClientError};

/// The subset of a cave record sibling services care about.
#[derive(Debug, Clone, Deserialize)]
pub struct CaveSummary {
    pub cave_id: i32,
    pub name: String,
    pub owner_email: String,
}

/// Typed client for cave-service calls.
#[derive(Clone)]
pub struct CaveServiceClient {
    inner: ServiceClient,
}

impl CaveServiceClient {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            inner: ServiceClient::new("cave-service", base_url, service_token, timeout_secs),
        }
    }

    /// Fetch a cave's name for display enrichment. Degrades to `None` on any
    /// failure; callers fall back to a placeholder name.
    pub async fn get_cave(&self, cave_id: i32) -> Option<CaveSummary> {
        match self
            .inner
            .get_json::<CaveSummary>(&format!("/caves/{}", cave_id))
            .await
        {
            Ok(cave) => Some(cave),
            Err(e) => {
                warn!(cave_id = cave_id, error = %e, "Cave lookup failed");
                None
            }
        }
    }

    /// Ask whether a user may modify a cave's attachments.
    ///
    /// This gates authorization, so it must FAIL CLOSED: exhausted retries or
    /// an error status propagate as an error and the caller denies access.
    pub async fn can_edit_cave(
        &self,
        cave_id: i32,
        user_email: &str,
    ) -> Result<bool, ServiceClientError> {
        let path = format!("/caves/{}/permissions/{}", cave_id, urlencode(user_email));
        let response: CavePermissionResponse = self.inner.get_json(&path).await?;
        Ok(response.can_edit)
    }
}

/// Placeholder display name when the cave service cannot be reached.
pub fn cave_name_fallback(cave_id: i32) -> String {
    format!("Cave #{}", cave_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cave_name_fallback() {
        assert_eq!(cave_name_fallback(42), "Cave #42");
    }

    #[tokio::test]
    async fn test_get_cave_degrades_to_none_on_unreachable_service() {
        let client = CaveServiceClient::new("http://127.0.0.1:1", "token", 1);
        assert!(client.get_cave(1).await.is_none());
    }

    #[tokio::test]
    async fn test_can_edit_fails_closed_on_unreachable_service() {
        // The permission probe must surface the failure instead of answering;
        // callers map any error to a denial.
        let client = CaveServiceClient::new("http://127.0.0.1:1", "token", 1);
        assert!(client.can_edit_cave(1, "user@example.com").await.is_err());
    }
}
