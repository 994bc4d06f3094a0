//! # Stores
//!
//! - [`ConfigStore`] - read-only migration configs
//! - [`ProgressStore`] - expected/completed job counters (in-memory or PostgreSQL)
//! - [`ArtifactStore`] - transient artifacts bridging download and upload jobs

pub mod artifact_store;
pub mod config_store;
pub mod errors;
pub mod progress_store;

pub use artifact_store::{artifact_name, ArtifactStore, FsArtifactStore};
pub use config_store::{ConfigStore, DataStoreConfigStore, InMemoryConfigStore};
pub use errors::{StoreError, StoreResult};
pub use progress_store::{InMemoryProgressStore, PgProgressStore, ProgressStore};
