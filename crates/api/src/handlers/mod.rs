//! Event handlers consumed from the broker, per service.

pub mod cave;
pub mod group;
pub mod media;
