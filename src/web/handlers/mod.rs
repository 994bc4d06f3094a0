//! # HTTP Handlers
//!
//! Grouped by the resource they act on.

pub mod failed_queue;
pub mod health;
pub mod jobs;
pub mod queues;
pub mod retry;
pub mod status;
