//! Shared utilities and common types for the CaveMap backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Bounded retry with exponential backoff
//! - Service-to-service identity verification
//! - Common validation logic

pub mod retry;
pub mod service_token;
pub mod validation;
