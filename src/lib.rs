//! # Analytics Migrator
//!
//! Queue-driven migration of aggregated analytics data values (and the
//! metadata they reference) from a source analytics system into the
//! destination system this service runs beside.
//!
//! A migration request is planned into many small jobs, one per slice of
//! data items, periods and org units. Jobs go onto durable per-config broker
//! queues. Download workers fetch and transform rows, upload workers import
//! them, and deletion workers remove them again. Any job that fails lands in the
//! config's dead-letter queue with its diagnostics, where the retry subsystem
//! can move it back.
//!
//! ## Modules
//!
//! - [`planner`] - dimension planning and pagination
//! - [`messaging`] - broker abstraction, RabbitMQ and in-memory providers, queue naming
//! - [`pipeline`] - producer, workers, failure routing and worker pools
//! - [`retry`] - bulk and single-message retry, failed-queue inspection
//! - [`status`] - per process type queued/processing/failed figures
//! - [`web`] - axum HTTP control surface
//! - [`bootstrap`] - wiring from [`config::MigratorConfig`]

pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod retry;
pub mod status;
pub mod store;
pub mod validation;
pub mod web;

pub use bootstrap::{MigratorBootstrap, MigratorSystemHandle};
pub use config::MigratorConfig;
pub use error::{MigratorError, MigratorResult};
