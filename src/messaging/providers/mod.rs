//! Broker implementations of [`MessagingService`](super::MessagingService).

pub mod in_memory;
pub mod management;
pub mod rabbitmq;

pub use in_memory::InMemoryMessagingService;
pub use rabbitmq::RabbitMqMessagingService;
