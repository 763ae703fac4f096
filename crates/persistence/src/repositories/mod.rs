//! Repository implementations.
//!
//! Repositories own a connection pool and encapsulate all SQL for one
//! entity family. Multi-step mutations that must be atomic (group creation,
//! the user-deletion cascade, cave deletion) run inside a single
//! transaction per call.

pub mod cave;
pub mod group;
pub mod media;

pub use cave::CaveRepository;
pub use group::{GroupRepository, UserDeletionOutcome};
pub use media::MediaRepository;
