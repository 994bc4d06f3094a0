//! # Status Aggregation
//!
//! Per process type `{queued, processing, failed}` for one config. Two
//! strategies fill in `queued` and `processing`:
//!
//! - [`ProgressCounterStrategy`] (metadata processes): expected minus completed
//!   jobs from the progress store, less the ones sitting in the DLQ. Exact for
//!   outstanding work, but the counters cannot tell a waiting job from one a
//!   worker holds, so everything outstanding is `queued` and `processing` is 0.
//! - [`BrokerDepthStrategy`] (data processes): live queue depth, with
//!   `processing = min(consumers, messages)`. A heuristic: a consumer may be idle
//!   between deliveries, so the split is approximate.
//!
//! `failed` always comes from one scan of the DLQ, counted by origin queue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use crate::error::MigratorResult;
use crate::messaging::{queue_names_for, MessagingProvider, QueueSet};
use crate::models::{MigrationStatus, ProcessStatus, ProcessType, StatusConfidence};
use crate::retry::RetryService;
use crate::store::ProgressStore;

#[async_trait]
pub trait StatusStrategy: Send + Sync {
    fn confidence(&self) -> StatusConfidence;

    /// `(queued, processing)` for one process type
    async fn queue_figures(
        &self,
        queues: &QueueSet,
        process: ProcessType,
        failed: u64,
    ) -> MigratorResult<(u64, u64)>;
}

pub struct ProgressCounterStrategy {
    progress: Arc<dyn ProgressStore>,
}

impl ProgressCounterStrategy {
    pub fn new(progress: Arc<dyn ProgressStore>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl StatusStrategy for ProgressCounterStrategy {
    fn confidence(&self) -> StatusConfidence {
        StatusConfidence::Exact
    }

    async fn queue_figures(
        &self,
        queues: &QueueSet,
        process: ProcessType,
        failed: u64,
    ) -> MigratorResult<(u64, u64)> {
        let record = self.progress.get(&queues.config_id, process).await?;
        // In-flight jobs are still outstanding; they count as queued
        Ok((record.outstanding().saturating_sub(failed), 0))
    }
}

pub struct BrokerDepthStrategy {
    messaging: Arc<MessagingProvider>,
}

impl BrokerDepthStrategy {
    pub fn new(messaging: Arc<MessagingProvider>) -> Self {
        Self { messaging }
    }
}

#[async_trait]
impl StatusStrategy for BrokerDepthStrategy {
    fn confidence(&self) -> StatusConfidence {
        StatusConfidence::Approximate
    }

    async fn queue_figures(
        &self,
        queues: &QueueSet,
        process: ProcessType,
        _failed: u64,
    ) -> MigratorResult<(u64, u64)> {
        let stats = self.messaging.queue_stats(queues.for_process(process)).await?;
        let processing = stats.consumer_count.min(stats.message_count);
        Ok((stats.message_count - processing, processing))
    }
}

pub struct StatusAggregator {
    counters: ProgressCounterStrategy,
    depth: BrokerDepthStrategy,
    retry: RetryService,
    scan_limit: usize,
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator")
            .field("scan_limit", &self.scan_limit)
            .finish_non_exhaustive()
    }
}

impl StatusAggregator {
    pub fn new(
        messaging: Arc<MessagingProvider>,
        progress: Arc<dyn ProgressStore>,
        retry: RetryService,
        scan_limit: usize,
    ) -> Self {
        Self {
            counters: ProgressCounterStrategy::new(progress),
            depth: BrokerDepthStrategy::new(messaging),
            retry,
            scan_limit,
        }
    }

    pub fn strategy_for(&self, process: ProcessType) -> &dyn StatusStrategy {
        if process.is_metadata() {
            &self.counters
        } else {
            &self.depth
        }
    }

    #[instrument(skip(self))]
    pub async fn status(&self, config_id: &str) -> MigratorResult<MigrationStatus> {
        let queues = queue_names_for(config_id)?;
        let scan = self.retry.scan_failed(&queues, self.scan_limit).await?;
        let failed_by_origin = scan.counts_by_origin();

        let mut processes = Vec::with_capacity(ProcessType::ALL.len());
        for (process, queue) in queues.work_queues() {
            let failed = failed_by_origin.get(queue).copied().unwrap_or(0);
            let strategy = self.strategy_for(process);
            let (queued, processing) = strategy.queue_figures(&queues, process, failed).await?;
            processes.push(ProcessStatus {
                process_type: process,
                queued,
                processing,
                failed,
                confidence: strategy.confidence(),
            });
        }

        Ok(MigrationStatus {
            config_id: config_id.to_string(),
            processes,
            failed_truncated: scan.truncated,
            generated_at: Utc::now(),
        })
    }
}
