//! Shared state handed to every handler.

use std::sync::Arc;

use crate::messaging::{MessagingProvider, QueueRegistry};
use crate::pipeline::{ConsumerRegistry, JobProducer, PipelineContext};
use crate::retry::RetryService;
use crate::status::StatusAggregator;
use crate::store::ProgressStore;
use crate::validation::DataValidator;

#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: PipelineContext,
    pub queues: Arc<QueueRegistry>,
    pub consumers: Arc<ConsumerRegistry>,
    pub retry: RetryService,
    pub status: Arc<StatusAggregator>,
    pub validator: Arc<DataValidator>,
    /// `maxRetries` used when a bulk retry request leaves it out
    pub default_max_retries: usize,
    pub request_timeout_ms: u64,
}

impl AppState {
    pub fn messaging(&self) -> &Arc<MessagingProvider> {
        &self.pipeline.messaging
    }

    pub fn progress(&self) -> &Arc<dyn ProgressStore> {
        &self.pipeline.progress
    }

    pub fn producer(&self) -> JobProducer {
        self.pipeline.producer()
    }
}
