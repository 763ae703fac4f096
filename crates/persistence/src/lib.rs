//! Persistence layer for the CaveMap backend.
//!
//! This crate contains:
//! - Database connection management with bounded startup retry
//! - Entity definitions (database row mappings) for all three services
//! - Repository implementations, including the transactional deletion
//!   cascades driven by consumed events
//!
//! Each service owns its own schema; the per-service migration directories
//! live under `src/migrations/`.

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
