//! # Worker Pool
//!
//! Consumers for one config's five work queues. Each consumer subscribes with
//! manual acknowledgement and hands every delivery to the [`JobDispatcher`];
//! the broker's prefetch bounds how many unacked jobs a consumer holds.
//! [`ConsumerRegistry`] keeps one pool per config that is currently being served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::MigratorResult;
use crate::messaging::{queue_names_for, QueueSet};

use super::dispatcher::{DispatchOutcome, JobDispatcher};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);
const MAX_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct WorkerPoolStats {
    pub completed: AtomicU64,
    pub dead_lettered: AtomicU64,
    pub broker_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolSnapshot {
    pub consumers: usize,
    pub completed: u64,
    pub dead_lettered: u64,
    pub broker_errors: u64,
}

pub struct WorkerPool {
    config_id: String,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<WorkerPoolStats>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config_id", &self.config_id)
            .field("consumers", &self.handles.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl WorkerPool {
    pub fn start(dispatcher: JobDispatcher, queues: &QueueSet, consumers_per_queue: usize) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(WorkerPoolStats::default());
        let mut handles = Vec::new();

        for (process, queue) in queues.work_queues() {
            for index in 0..consumers_per_queue.max(1) {
                let consumer_tag = format!(
                    "{process}-{index}-{}",
                    &uuid::Uuid::new_v4().simple().to_string()[..8]
                );
                handles.push(tokio::spawn(consume(
                    dispatcher.clone(),
                    queue.to_string(),
                    consumer_tag,
                    shutdown_rx.clone(),
                    stats.clone(),
                )));
            }
        }

        info!(
            config_id = %queues.config_id,
            consumers = handles.len(),
            "🚀 Worker pool started"
        );
        Self {
            config_id: queues.config_id.clone(),
            shutdown,
            handles,
            stats,
        }
    }

    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    pub fn snapshot(&self) -> WorkerPoolSnapshot {
        WorkerPoolSnapshot {
            consumers: self.handles.len(),
            completed: self.stats.completed.load(Ordering::Relaxed),
            dead_lettered: self.stats.dead_lettered.load(Ordering::Relaxed),
            broker_errors: self.stats.broker_errors.load(Ordering::Relaxed),
        }
    }

    /// Signal every consumer and wait up to `grace` for in-flight jobs; stragglers are aborted
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(true);
        let deadline = tokio::time::Instant::now() + grace;

        for mut handle in self.handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(config_id = %self.config_id, "Consumer did not stop within grace period; aborting");
                handle.abort();
            }
        }
        info!(config_id = %self.config_id, "🛑 Worker pool stopped");
    }
}

async fn consume(
    dispatcher: JobDispatcher,
    queue: String,
    consumer_tag: String,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<WorkerPoolStats>,
) {
    let messaging = dispatcher.context().messaging.clone();
    let mut delay = RESUBSCRIBE_DELAY;

    'subscribe: while !*shutdown.borrow() {
        let mut stream = match messaging.subscribe(&queue, &consumer_tag).await {
            Ok(stream) => stream,
            Err(e) => {
                stats.broker_errors.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %queue, error = %e, retry_in = ?delay, "Subscribe failed");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break 'subscribe,
                }
                delay = (delay * 2).min(MAX_RESUBSCRIBE_DELAY);
                continue;
            }
        };
        debug!(queue = %queue, consumer_tag = %consumer_tag, "Consumer subscribed");

        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = shutdown.changed() => break 'subscribe,
            };

            match next {
                Some(Ok(delivery)) => {
                    delay = RESUBSCRIBE_DELAY;
                    match dispatcher.process(delivery).await {
                        Ok(DispatchOutcome::Completed(_)) => {
                            stats.completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(DispatchOutcome::DeadLettered(_)) => {
                            stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            // Unacked deliveries return to the queue when the channel closes
                            stats.broker_errors.fetch_add(1, Ordering::Relaxed);
                            error!(queue = %queue, error = %e, "Failed to settle delivery");
                        }
                    }
                }
                Some(Err(e)) => {
                    stats.broker_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(queue = %queue, error = %e, "Consumer stream error; resubscribing");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => break 'subscribe,
                    }
                    delay = (delay * 2).min(MAX_RESUBSCRIBE_DELAY);
                    continue 'subscribe;
                }
                None => {
                    info!(queue = %queue, "Queue closed; consumer exiting");
                    break 'subscribe;
                }
            }
        }
    }
    debug!(queue = %queue, consumer_tag = %consumer_tag, "Consumer stopped");
}

/// Running worker pools keyed by config id
pub struct ConsumerRegistry {
    dispatcher: JobDispatcher,
    consumers_per_queue: usize,
    grace: Duration,
    pools: DashMap<String, WorkerPool>,
}

impl std::fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("consumers_per_queue", &self.consumers_per_queue)
            .field("running", &self.running())
            .finish()
    }
}

impl ConsumerRegistry {
    pub fn new(dispatcher: JobDispatcher, consumers_per_queue: usize, grace: Duration) -> Self {
        Self {
            dispatcher,
            consumers_per_queue,
            grace,
            pools: DashMap::new(),
        }
    }

    /// Start serving a config; `Ok(false)` when it is already served
    pub fn start(&self, config_id: &str) -> MigratorResult<bool> {
        let queues = queue_names_for(config_id)?;
        match self.pools.entry(config_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(WorkerPool::start(
                    self.dispatcher.clone(),
                    &queues,
                    self.consumers_per_queue,
                ));
                Ok(true)
            }
        }
    }

    /// Stop serving a config; `false` when it was not served
    pub async fn stop(&self, config_id: &str) -> bool {
        match self.pools.remove(config_id) {
            Some((_, pool)) => {
                pool.shutdown(self.grace).await;
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, config_id: &str) -> bool {
        self.pools.contains_key(config_id)
    }

    pub fn snapshot(&self, config_id: &str) -> Option<WorkerPoolSnapshot> {
        self.pools.get(config_id).map(|pool| pool.snapshot())
    }

    pub fn running(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn stop_all(&self) {
        for config_id in self.running() {
            self.stop(&config_id).await;
        }
    }
}
