//! Request identity extraction.
//!
//! End-user authentication terminates at the oauth2 proxy in front of the
//! services; by the time a request arrives here the proxy has stamped
//! `X-Auth-Request-Email` / `X-Auth-Request-User` headers. Sibling services
//! authenticate instead with the internal credential in `X-Service-Token`,
//! checked through the pluggable [`ServiceTokenVerifier`].

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shared::service_token::{ServiceTokenVerifier, SERVICE_IDENTITY, SERVICE_TOKEN_HEADER};

use crate::error::ApiError;

/// Header stamped by the auth proxy with the authenticated email.
const AUTH_EMAIL_HEADER: &str = "X-Auth-Request-Email";

/// Header stamped by the auth proxy with the display username.
const AUTH_USER_HEADER: &str = "X-Auth-Request-User";

/// State capable of verifying service credentials.
pub trait AuthState: Clone + Send + Sync + 'static {
    fn token_verifier(&self) -> &Arc<dyn ServiceTokenVerifier>;
}

/// The authenticated caller: either a proxied end user or a sibling service.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
    pub username: String,
    pub is_service: bool,
}

#[async_trait]
impl<S: AuthState> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Service token wins: internal calls carry no proxy headers.
        if let Some(token) = header(parts, SERVICE_TOKEN_HEADER) {
            if state.token_verifier().verify(&token).await {
                return Ok(CurrentUser {
                    email: SERVICE_IDENTITY.to_string(),
                    username: "service".to_string(),
                    is_service: true,
                });
            }
            return Err(ApiError::Unauthorized("Invalid service token".into()));
        }

        match header(parts, AUTH_EMAIL_HEADER) {
            Some(email) if !email.is_empty() => {
                let username = header(parts, AUTH_USER_HEADER)
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| local_part(&email).to_string());
                Ok(CurrentUser {
                    email,
                    username,
                    is_service: false,
                })
            }
            _ => Err(ApiError::Unauthorized("Authentication required".into())),
        }
    }
}

/// Guard for internal endpoints: only a valid service token passes.
#[derive(Debug, Clone, Copy)]
pub struct ServiceIdentity;

#[async_trait]
impl<S: AuthState> FromRequestParts<S> for ServiceIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = header(parts, SERVICE_TOKEN_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Service token required".into()))?;

        if state.token_verifier().verify(&token).await {
            Ok(ServiceIdentity)
        } else {
            Err(ApiError::Unauthorized("Service token required".into()))
        }
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Fallback display name for an email: everything before the '@'.
pub fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use shared::service_token::SharedSecretVerifier;

    #[derive(Clone)]
    struct TestState {
        verifier: Arc<dyn ServiceTokenVerifier>,
    }

    impl AuthState for TestState {
        fn token_verifier(&self) -> &Arc<dyn ServiceTokenVerifier> {
            &self.verifier
        }
    }

    fn state() -> TestState {
        TestState {
            verifier: Arc::new(SharedSecretVerifier::new("secret-token")),
        }
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_service_token_authenticates_as_service() {
        let mut p = parts(&[("X-Service-Token", "secret-token")]);
        let user = CurrentUser::from_request_parts(&mut p, &state()).await.unwrap();
        assert!(user.is_service);
        assert_eq!(user.email, SERVICE_IDENTITY);
    }

    #[tokio::test]
    async fn test_invalid_service_token_rejected() {
        let mut p = parts(&[("X-Service-Token", "wrong")]);
        assert!(CurrentUser::from_request_parts(&mut p, &state()).await.is_err());
    }

    #[tokio::test]
    async fn test_proxy_headers_authenticate_user() {
        let mut p = parts(&[
            ("X-Auth-Request-Email", "alice@example.com"),
            ("X-Auth-Request-User", "alice"),
        ]);
        let user = CurrentUser::from_request_parts(&mut p, &state()).await.unwrap();
        assert!(!user.is_service);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_missing_username_falls_back_to_local_part() {
        let mut p = parts(&[("X-Auth-Request-Email", "bob@example.com")]);
        let user = CurrentUser::from_request_parts(&mut p, &state()).await.unwrap();
        assert_eq!(user.username, "bob");
    }

    #[tokio::test]
    async fn test_anonymous_request_rejected() {
        let mut p = parts(&[]);
        assert!(CurrentUser::from_request_parts(&mut p, &state()).await.is_err());
    }

    #[tokio::test]
    async fn test_service_identity_requires_token() {
        let mut p = parts(&[("X-Auth-Request-Email", "alice@example.com")]);
        assert!(ServiceIdentity::from_request_parts(&mut p, &state()).await.is_err());

        let mut p = parts(&[("X-Service-Token", "secret-token")]);
        assert!(ServiceIdentity::from_request_parts(&mut p, &state()).await.is_ok());
    }

    #[test]
    fn test_local_part() {
        assert_eq!(local_part("alice@example.com"), "alice");
        assert_eq!(local_part("no-at-sign"), "no-at-sign");
    }
}
