//! Application services built on repositories, the publisher and the
//! sibling-service clients.

pub mod cave_ops;

pub use cave_ops::CaveOps;
