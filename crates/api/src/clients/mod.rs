//! HTTP clients for sibling services.
//!
//! All outbound calls go through [`service_client::ServiceClient`], which
//! owns the retry policy: transport failures are retried with backoff,
//! HTTP status outcomes are final.

pub mod cave_service;
pub mod group_service;
pub mod service_client;
pub mod user_service;

pub use cave_service::CaveServiceClient;
pub use group_service::GroupServiceClient;
pub use service_client::{ServiceClient, ServiceClientError};
pub use user_service::UserServiceClient;
