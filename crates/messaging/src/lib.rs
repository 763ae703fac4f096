//! Message broker integration for the CaveMap backend.
//!
//! This crate contains:
//! - [`EventPublisher`]: best-effort topic publishing of deletion events
//! - [`EventConsumer`]: durable subscription dispatching to registered
//!   [`EventHandler`]s with handler-level error isolation
//!
//! Both are explicitly constructed components with `start`/`stop`
//! lifecycles, held in application state rather than module globals.

pub mod consumer;
pub mod publisher;

pub use consumer::{ConsumerState, EventConsumer, EventHandler};
pub use publisher::{EventPublisher, PublishError};
