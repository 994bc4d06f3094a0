//! # Messaging Provider Enum
//!
//! Enum dispatch over the broker implementations. Everything above the messaging
//! layer holds an `Arc<MessagingProvider>` and stays non-generic.

use super::errors::MessagingResult;
use super::providers::{InMemoryMessagingService, RabbitMqMessagingService};
use super::traits::MessagingService;
use super::types::{BrokerMessage, DeliveryHandle, DeliveryStream, MessageId, QueueSpec, QueueStats};

#[derive(Debug)]
pub enum MessagingProvider {
    /// RabbitMQ via lapin plus the management API
    RabbitMq(RabbitMqMessagingService),
    /// In-process queues for tests and local runs
    InMemory(InMemoryMessagingService),
}

macro_rules! dispatch {
    ($self:ident, $service:ident => $call:expr) => {
        match $self {
            MessagingProvider::RabbitMq($service) => $call,
            MessagingProvider::InMemory($service) => $call,
        }
    };
}

impl MessagingProvider {
    pub fn provider_name(&self) -> &'static str {
        dispatch!(self, s => s.provider_name())
    }

    /// The in-memory service, when that is the active provider
    pub fn as_in_memory(&self) -> Option<&InMemoryMessagingService> {
        match self {
            Self::InMemory(s) => Some(s),
            Self::RabbitMq(_) => None,
        }
    }

    pub async fn ensure_queue(&self, spec: &QueueSpec) -> MessagingResult<()> {
        dispatch!(self, s => s.ensure_queue(spec).await)
    }

    pub async fn delete_queue(&self, queue_name: &str) -> MessagingResult<()> {
        dispatch!(self, s => s.delete_queue(queue_name).await)
    }

    pub async fn purge_queue(&self, queue_name: &str) -> MessagingResult<u64> {
        dispatch!(self, s => s.purge_queue(queue_name).await)
    }

    pub async fn publish(&self, queue_name: &str, message: &BrokerMessage) -> MessagingResult<MessageId> {
        dispatch!(self, s => s.publish(queue_name, message).await)
    }

    pub async fn subscribe(&self, queue_name: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream> {
        dispatch!(self, s => s.subscribe(queue_name, consumer_tag).await)
    }

    pub async fn ack(&self, handle: &DeliveryHandle) -> MessagingResult<()> {
        dispatch!(self, s => s.ack(handle).await)
    }

    pub async fn nack(&self, handle: &DeliveryHandle, requeue: bool) -> MessagingResult<()> {
        dispatch!(self, s => s.nack(handle, requeue).await)
    }

    pub async fn peek(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        dispatch!(self, s => s.peek(queue_name, count).await)
    }

    pub async fn take(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        dispatch!(self, s => s.take(queue_name, count).await)
    }

    pub async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        dispatch!(self, s => s.queue_stats(queue_name).await)
    }

    pub async fn health_check(&self) -> MessagingResult<bool> {
        dispatch!(self, s => s.health_check().await)
    }
}

impl From<InMemoryMessagingService> for MessagingProvider {
    fn from(service: InMemoryMessagingService) -> Self {
        Self::InMemory(service)
    }
}

impl From<RabbitMqMessagingService> for MessagingProvider {
    fn from(service: RabbitMqMessagingService) -> Self {
        Self::RabbitMq(service)
    }
}
