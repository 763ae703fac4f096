//! Middleware and request-context extraction.

pub mod auth;
pub mod logging;
pub mod metrics;

pub use auth::{AuthState, CurrentUser, ServiceIdentity};
pub use metrics::{init_metrics, metrics_handler};
