//! Bounded per-owner dataset history.

pub mod backend;
pub mod store;

pub use backend::{DatasetBackend, JsonFileBackend, MemoryBackend};
pub use store::{RetentionStore, DEFAULT_CAPACITY};
