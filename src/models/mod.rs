//! # Data Models
//!
//! Serde-backed types shared by every layer of the migrator.
//!
//! - [`MigrationConfig`] / [`DataItemConfig`] - what to migrate, read from the config store
//! - [`RuntimeConfig`] - per-run options supplied with a job request
//! - [`Job`] - the tagged union carried in queue message bodies
//! - [`DimensionMap`] - analytics dimensions (`ou`, `pe`, `dx`, attribute filters)
//! - [`DataValue`] / [`DataValueSet`] / [`ImportSummary`] - destination import payloads
//! - [`ProgressRecord`] / [`ProcessStatus`] - progress accounting and reporting views

pub mod data_value;
pub mod dimensions;
pub mod job;
pub mod migration_config;
pub mod progress;
pub mod runtime_config;

pub use data_value::{DataValue, DataValueSet, ImportConflict, ImportCount, ImportStrategy, ImportSummary};
pub use dimensions::{Dimension, DimensionKey, DimensionMap};
pub use job::{DataJob, Job, MetadataJob, ProcessType, UploadJob};
pub use migration_config::{
    ConnectionConfig, Credentials, DataItemConfig, DataItemType, ItemMapping, MigrationConfig,
};
pub use progress::{MigrationStatus, ProcessStatus, ProgressRecord, StatusConfidence};
pub use runtime_config::RuntimeConfig;
