//! # Messaging
//!
//! Broker abstraction for the migration pipeline.
//!
//! - [`MessagingService`] - provider trait (declare, publish, subscribe, ack/nack, peek/take, stats)
//! - [`MessagingProvider`] - enum dispatch over [`RabbitMqMessagingService`] and [`InMemoryMessagingService`]
//! - [`queues`] - per-config queue naming and lifecycle
//! - [`headers`] - header names used for pagination, dead-lettering and retry

pub mod errors;
pub mod headers;
pub mod provider;
pub mod providers;
pub mod queues;
pub mod traits;
pub mod types;

pub use errors::{MessagingError, MessagingResult};
pub use provider::MessagingProvider;
pub use providers::{InMemoryMessagingService, RabbitMqMessagingService};
pub use queues::{parse_work_queue, queue_names_for, PurgeReport, QueueRegistry, QueueSet};
pub use traits::MessagingService;
pub use types::{
    BrokerMessage, Delivery, DeliveryHandle, DeliveryStream, MessageHeaders, MessageId, QueueSpec,
    QueueStats,
};
