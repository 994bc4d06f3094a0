//! # Messaging Service Trait
//!
//! The broker operations the pipeline composes from. Consumption is push-based
//! (`subscribe`) so broker consumer counts reflect live workers; DLQ inspection and
//! retry use the two management primitives, non-destructive `peek` and destructive
//! `take`, both reading from the head of the queue.

use async_trait::async_trait;

use super::errors::MessagingResult;
use super::types::{BrokerMessage, DeliveryHandle, DeliveryStream, MessageId, QueueSpec, QueueStats};

#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Declare a durable queue (idempotent)
    async fn ensure_queue(&self, spec: &QueueSpec) -> MessagingResult<()>;

    async fn delete_queue(&self, queue_name: &str) -> MessagingResult<()>;

    /// Drop all ready messages, returning how many were removed
    async fn purge_queue(&self, queue_name: &str) -> MessagingResult<u64>;

    /// Publish persistently and wait for the broker's confirmation
    async fn publish(&self, queue_name: &str, message: &BrokerMessage) -> MessagingResult<MessageId>;

    /// Start a manual-ack consumer on a queue
    async fn subscribe(&self, queue_name: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream>;

    async fn ack(&self, handle: &DeliveryHandle) -> MessagingResult<()>;

    /// Reject a delivery; with `requeue == false` the broker dead-letters it
    async fn nack(&self, handle: &DeliveryHandle, requeue: bool) -> MessagingResult<()>;

    /// Read up to `count` messages from the head without removing them
    async fn peek(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>>;

    /// Remove and return up to `count` messages from the head
    async fn take(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>>;

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats>;

    async fn health_check(&self) -> MessagingResult<bool>;

    fn provider_name(&self) -> &'static str;
}
