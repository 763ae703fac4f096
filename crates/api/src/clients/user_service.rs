//! Client for the external identity service.

use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::service_client::ServiceClient;
use crate::middleware::auth::local_part;

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    emails: &'a [String],
}

/// Typed client for user-service calls.
#[derive(Clone)]
pub struct UserServiceClient {
    inner: ServiceClient,
}

impl UserServiceClient {
    pub fn new(base_url: impl Into<String>, service_token: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            inner: ServiceClient::new("user-service", base_url, service_token, timeout_secs),
        }
    }

    /// Resolve emails to display usernames.
    ///
    /// Enrichment only: on any failure (after retries) this degrades to an
    /// empty map and the caller falls back to the email's local part.
    pub async fn lookup_usernames(&self, emails: &[String]) -> HashMap<String, String> {
        if emails.is_empty() {
            return HashMap::new();
        }

        match self
            .inner
            .post_json::<_, HashMap<String, String>>("/users/lookup", &LookupRequest { emails })
            .await
        {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, count = emails.len(), "Username lookup failed, falling back to emails");
                HashMap::new()
            }
        }
    }
}

/// Display name for an email: the looked-up username, else the local part.
pub fn username_or_fallback(usernames: &HashMap<String, String>, email: &str) -> String {
    usernames
        .get(email)
        .cloned()
        .unwrap_or_else(|| local_part(email).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_or_fallback_prefers_lookup() {
        let mut map = HashMap::new();
        map.insert("alice@example.com".to_string(), "Alice".to_string());
        assert_eq!(username_or_fallback(&map, "alice@example.com"), "Alice");
    }

    #[test]
    fn test_username_or_fallback_uses_local_part() {
        let map = HashMap::new();
        assert_eq!(username_or_fallback(&map, "bob@example.com"), "bob");
    }

    #[tokio::test]
    async fn test_lookup_degrades_to_empty_map_on_unreachable_service() {
        let client = UserServiceClient::new("http://127.0.0.1:1", "token", 1);
        let result = client
            .lookup_usernames(&["a@b.com".to_string()])
            .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_with_no_emails_skips_the_call() {
        let client = UserServiceClient::new("http://127.0.0.1:1", "token", 1);
        assert!(client.lookup_usernames(&[]).await.is_empty());
    }
}
