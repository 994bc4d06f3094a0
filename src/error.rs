//! # Error Handling
//!
//! Crate-level error taxonomy. Each layer has its own `thiserror` enum
//! ([`MessagingError`], [`ClientError`], [`StoreError`], [`PlannerError`]) and
//! [`MigratorError`] wraps them for operations that cross layers.

use thiserror::Error;

use crate::clients::ClientError;
use crate::messaging::MessagingError;
use crate::models::ProcessType;
use crate::planner::PlannerError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Migration config not found: {config_id}")]
    ConfigNotFound { config_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Planning error: {0}")]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Partial enqueue of {process_type} jobs: {enqueued} enqueued, {failed} failed (first error: {first_error})")]
    PartialEnqueue {
        process_type: ProcessType,
        enqueued: usize,
        failed: usize,
        first_error: String,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigratorError {
    pub fn config_not_found(config_id: impl Into<String>) -> Self {
        Self::ConfigNotFound {
            config_id: config_id.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn is_broker_unavailable(&self) -> bool {
        matches!(self, Self::Messaging(err) if err.is_broker_unavailable())
    }
}

impl From<config::ConfigError> for MigratorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type MigratorResult<T> = Result<T, MigratorError>;
