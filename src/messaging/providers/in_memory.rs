//! # In-Memory Messaging Service
//!
//! Thread-safe in-memory broker for tests and local development.
//!
//! ## Behaviour
//!
//! - **Manual acknowledgement**: a delivered message stays in its queue, invisible
//!   to other consumers, until it is acked or nacked
//! - **Dead-lettering**: a nack without requeue moves the message to the queue's
//!   declared dead-letter queue and stamps `x-first-death-queue`, like a broker DLX
//! - **Consumer counts**: every live subscription counts as one consumer until its
//!   stream is dropped
//! - **Fault injection**: publishes to chosen queues can be made to fail, and the
//!   whole broker can be taken offline

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::headers;
use crate::messaging::traits::MessagingService;
use crate::messaging::types::{
    BrokerMessage, Delivery, DeliveryHandle, DeliveryStream, MessageId, QueueSpec, QueueStats,
};

const CONSUMER_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    message: BrokerMessage,
    in_flight: bool,
    delivered_before: bool,
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    messages: VecDeque<StoredMessage>,
    dead_letter_queue: Option<String>,
    consumers: u64,
}

impl InMemoryQueue {
    fn ready_positions(&self, count: usize) -> Vec<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.in_flight)
            .map(|(idx, _)| idx)
            .take(count)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    queues: Mutex<HashMap<String, InMemoryQueue>>,
    next_id: AtomicU64,
    notify: Notify,
    /// Queue name to the number of publishes still allowed before failures start
    failing_publishes: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl Inner {
    fn check_online(&self) -> MessagingResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MessagingError::broker_unavailable("in-memory broker is offline"));
        }
        Ok(())
    }

    fn push(&self, queue_name: &str, message: BrokerMessage) -> MessagingResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        queue.messages.push_back(StoredMessage {
            id,
            message,
            in_flight: false,
            delivered_before: false,
        });
        drop(queues);
        self.notify.notify_waiters();
        Ok(id)
    }

    /// `Ok(None)` when nothing is ready, `Err` when the queue is gone
    fn claim_next(&self, queue_name: &str) -> Result<Option<Delivery>, ()> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(queue_name).ok_or(())?;
        let Some(stored) = queue.messages.iter_mut().find(|m| !m.in_flight) else {
            return Ok(None);
        };

        stored.in_flight = true;
        let mut message = stored.message.clone();
        message.redelivered = stored.delivered_before;
        stored.delivered_before = true;

        Ok(Some(Delivery {
            message,
            handle: DeliveryHandle::InMemory {
                queue_name: queue_name.to_string(),
                id: stored.id,
            },
        }))
    }

    fn settle(&self, queue_name: &str, id: u64) -> MessagingResult<(StoredMessage, Option<String>)> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        let position = queue
            .messages
            .iter()
            .position(|m| m.id == id && m.in_flight)
            .ok_or_else(|| {
                MessagingError::acknowledge(queue_name, format!("unknown delivery {id}"))
            })?;
        let stored = queue
            .messages
            .remove(position)
            .ok_or_else(|| MessagingError::internal("delivery vanished while settling"))?;
        Ok((stored, queue.dead_letter_queue.clone()))
    }
}

/// Releases the consumer slot when a subscription stream is dropped
struct ConsumerGuard {
    inner: Arc<Inner>,
    queue_name: String,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        if let Some(queue) = self.inner.queues.lock().get_mut(&self.queue_name) {
            queue.consumers = queue.consumers.saturating_sub(1);
        }
    }
}

/// In-memory broker implementing [`MessagingService`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessagingService {
    inner: Arc<Inner>,
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages in a queue, ready and in flight (for testing)
    pub fn queue_length(&self, queue_name: &str) -> usize {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Snapshot of every message in a queue, head first (for testing)
    pub fn messages(&self, queue_name: &str) -> Vec<BrokerMessage> {
        self.inner
            .queues
            .lock()
            .get(queue_name)
            .map(|q| q.messages.iter().map(|m| m.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn queue_exists(&self, queue_name: &str) -> bool {
        self.inner.queues.lock().contains_key(queue_name)
    }

    /// Make every publish to `queue_name` fail until restored
    pub fn fail_publishes_to(&self, queue_name: &str) {
        self.fail_publishes_after(queue_name, 0);
    }

    /// Let `allowed` more publishes to `queue_name` through, then fail the rest
    pub fn fail_publishes_after(&self, queue_name: &str, allowed: usize) {
        self.inner
            .failing_publishes
            .lock()
            .insert(queue_name.to_string(), allowed);
    }

    pub fn restore_publishes_to(&self, queue_name: &str) {
        self.inner.failing_publishes.lock().remove(queue_name);
    }

    /// Simulate losing the broker connection
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, spec: &QueueSpec) -> MessagingResult<()> {
        self.inner.check_online()?;
        let mut queues = self.inner.queues.lock();
        let queue = queues.entry(spec.name.clone()).or_default();
        if queue.dead_letter_queue.is_none() {
            queue.dead_letter_queue = spec.dead_letter_queue.clone();
        }
        Ok(())
    }

    async fn delete_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.inner.check_online()?;
        self.inner.queues.lock().remove(queue_name);
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn purge_queue(&self, queue_name: &str) -> MessagingResult<u64> {
        self.inner.check_online()?;
        let mut queues = self.inner.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        let before = queue.messages.len();
        queue.messages.retain(|m| m.in_flight);
        Ok((before - queue.messages.len()) as u64)
    }

    async fn publish(&self, queue_name: &str, message: &BrokerMessage) -> MessagingResult<MessageId> {
        self.inner.check_online()?;
        if let Some(allowed) = self.inner.failing_publishes.lock().get_mut(queue_name) {
            if *allowed == 0 {
                return Err(MessagingError::publish(queue_name, "publish rejected (injected failure)"));
            }
            *allowed -= 1;
        }

        let mut message = message.clone();
        let message_id = message
            .message_id
            .get_or_insert_with(|| MessageId::generate().0)
            .clone();
        message.redelivered = false;
        self.inner.push(queue_name, message)?;
        Ok(MessageId(message_id))
    }

    async fn subscribe(&self, queue_name: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream> {
        self.inner.check_online()?;
        {
            let mut queues = self.inner.queues.lock();
            let queue = queues
                .get_mut(queue_name)
                .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
            queue.consumers += 1;
        }
        debug!(queue = %queue_name, consumer_tag = %consumer_tag, "In-memory consumer subscribed");

        let guard = ConsumerGuard {
            inner: self.inner.clone(),
            queue_name: queue_name.to_string(),
        };

        let stream = futures::stream::unfold(guard, |guard| async move {
            loop {
                if let Err(err) = guard.inner.check_online() {
                    return Some((Err(err), guard));
                }
                match guard.inner.claim_next(&guard.queue_name) {
                    Ok(Some(delivery)) => return Some((Ok(delivery), guard)),
                    Ok(None) => {}
                    // Queue deleted: the consumer is cancelled
                    Err(()) => return None,
                }
                let notified = guard.inner.notify.notified();
                let _ = tokio::time::timeout(CONSUMER_POLL_INTERVAL, notified).await;
            }
        });

        Ok(Box::pin(stream))
    }

    async fn ack(&self, handle: &DeliveryHandle) -> MessagingResult<()> {
        self.inner.check_online()?;
        match handle {
            DeliveryHandle::InMemory { queue_name, id } => {
                self.inner.settle(queue_name, *id)?;
                Ok(())
            }
            other => Err(MessagingError::internal(format!(
                "in-memory broker cannot ack foreign delivery {other:?}"
            ))),
        }
    }

    async fn nack(&self, handle: &DeliveryHandle, requeue: bool) -> MessagingResult<()> {
        self.inner.check_online()?;
        let DeliveryHandle::InMemory { queue_name, id } = handle else {
            return Err(MessagingError::internal(format!(
                "in-memory broker cannot nack foreign delivery {handle:?}"
            )));
        };

        if requeue {
            let mut queues = self.inner.queues.lock();
            if let Some(stored) = queues
                .get_mut(queue_name)
                .and_then(|q| q.messages.iter_mut().find(|m| m.id == *id))
            {
                stored.in_flight = false;
            }
            drop(queues);
            self.inner.notify.notify_waiters();
            return Ok(());
        }

        let (stored, dead_letter_queue) = self.inner.settle(queue_name, *id)?;
        if let Some(dlq) = dead_letter_queue {
            let mut message = stored.message;
            message
                .headers
                .insert(headers::FIRST_DEATH_QUEUE.to_string(), queue_name.clone().into());
            message
                .headers
                .insert(headers::FIRST_DEATH_REASON.to_string(), "rejected".into());
            message.redelivered = false;
            self.inner.push(&dlq, message)?;
        }
        Ok(())
    }

    async fn peek(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        self.inner.check_online()?;
        let queues = self.inner.queues.lock();
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        Ok(queue
            .ready_positions(count)
            .into_iter()
            .map(|idx| queue.messages[idx].message.clone())
            .collect())
    }

    async fn take(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        self.inner.check_online()?;
        let mut queues = self.inner.queues.lock();
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let positions = queue.ready_positions(count);
        let mut taken: Vec<BrokerMessage> = positions
            .iter()
            .rev()
            .filter_map(|idx| queue.messages.remove(*idx))
            .map(|stored| stored.message)
            .collect();
        taken.reverse();
        Ok(taken)
    }

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        self.inner.check_online()?;
        let queues = self.inner.queues.lock();
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        Ok(QueueStats {
            queue_name: queue_name.to_string(),
            message_count: queue.messages.len() as u64,
            consumer_count: queue.consumers,
        })
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        Ok(!self.inner.offline.load(Ordering::SeqCst))
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
