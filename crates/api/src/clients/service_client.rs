//! Base HTTP client for service-to-service calls.

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::retry::RetryPolicy;
use shared::service_token::SERVICE_TOKEN_HEADER;
use std::time::Duration;
use thiserror::Error;

/// Errors from a sibling-service call.
#[derive(Debug, Error)]
pub enum ServiceClientError {
    /// Connection-level failure (timeout, refused, unreachable). Retried.
    #[error("transport error calling {service}: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The sibling answered with a non-success status. Never retried; the
    /// response is an authoritative outcome.
    #[error("{service} returned status {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    /// The sibling answered 2xx but the body did not parse.
    #[error("invalid response body from {service}: {source}")]
    Body {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ServiceClientError {
    /// Transport failures are worth retrying; status and body outcomes are
    /// final.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceClientError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect()
            }
            _ => false,
        }
    }
}

/// One configured collaborator endpoint plus the retry policy for it.
#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    client: Client,
    base_url: String,
    service_token: String,
    policy: RetryPolicy,
}

impl ServiceClient {
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        service_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            service,
            client,
            base_url: base_url.into(),
            service_token: service_token.into(),
            policy: RetryPolicy::inter_service(),
        }
    }

    /// Name of the collaborator, for logs.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// GET a JSON body. Non-2xx is a final `Status` error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ServiceClientError> {
        let response = self.send_with_retry(Method::GET, path, None).await?;
        self.decode(response).await
    }

    /// POST a JSON body, expecting a JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceClientError> {
        let payload = serde_json::to_value(body).expect("body serializes");
        let response = self
            .send_with_retry(Method::POST, path, Some(payload))
            .await?;
        self.decode(response).await
    }

    /// DELETE, returning the final status. Non-2xx is a final `Status` error.
    pub async fn delete(&self, path: &str) -> Result<StatusCode, ServiceClientError> {
        let response = self.send_with_retry(Method::DELETE, path, None).await?;
        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(ServiceClientError::Status {
                service: self.service,
                status,
            })
        }
    }

    /// Run one request under the retry policy. Only the send itself is
    /// retried; whatever status comes back is passed through untouched.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, ServiceClientError> {
        let url = format!("{}{}", self.base_url, path);
        let service = self.service;

        self.policy
            .run(
                path,
                || {
                    let mut request = self
                        .client
                        .request(method.clone(), &url)
                        .header(SERVICE_TOKEN_HEADER, &self.service_token);
                    if let Some(body) = &body {
                        request = request.json(body);
                    }
                    async move {
                        request
                            .send()
                            .await
                            .map_err(|source| ServiceClientError::Transport { service, source })
                    }
                },
                ServiceClientError::is_transient,
            )
            .await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ServiceClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceClientError::Status {
                service: self.service,
                status,
            });
        }
        response
            .json()
            .await
            .map_err(|source| ServiceClientError::Body {
                service: self.service,
                source,
            })
    }
}

/// Minimal percent-encoding for email addresses in path/query position.
pub fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode_email() {
        assert_eq!(urlencode("a@b.com"), "a%40b.com");
        assert_eq!(urlencode("plain"), "plain");
        assert_eq!(urlencode("with space"), "with%20space");
    }

    fn client() -> ServiceClient {
        // Port 1 refuses connections immediately.
        ServiceClient::new("test-service", "http://127.0.0.1:1", "token", 1)
    }

    #[test]
    fn test_status_errors_are_final() {
        let err = ServiceClientError::Status {
            service: "test-service",
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert!(!err.is_transient());

        let err = ServiceClientError::Status {
            service: "test-service",
            status: StatusCode::NOT_FOUND,
        };
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_connect_refused_surfaces_as_transport_error() {
        let result: Result<serde_json::Value, _> = client().get_json("/anything").await;
        match result {
            Err(e @ ServiceClientError::Transport { .. }) => assert!(e.is_transient()),
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }
}
