//! # Messaging Error Types
//!
//! Structured broker errors. `BrokerUnavailable` is kept apart from every other
//! variant so callers can tell "no channel" from "empty queue".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker unavailable: {message}")]
    BrokerUnavailable { message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Publish to {queue_name} failed: {message}")]
    Publish { queue_name: String, message: String },

    #[error("Acknowledgement on {queue_name} failed: {message}")]
    Acknowledge { queue_name: String, message: String },

    #[error("Management API error (status {status:?}): {message}")]
    Management { status: Option<u16>, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Invalid queue name: {queue_name}: {reason}")]
    InvalidQueueName { queue_name: String, reason: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    pub fn broker_unavailable(message: impl Into<String>) -> Self {
        Self::BrokerUnavailable {
            message: message.into(),
        }
    }

    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    pub fn publish(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn acknowledge(queue_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acknowledge {
            queue_name: queue_name.into(),
            message: message.into(),
        }
    }

    pub fn management(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Management {
            status,
            message: message.into(),
        }
    }

    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    pub fn invalid_queue_name(queue_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQueueName {
            queue_name: queue_name.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_broker_unavailable(&self) -> bool {
        matches!(self, Self::BrokerUnavailable { .. })
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::message_serialization(err.to_string())
    }
}

impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::InvalidConnectionState(_)
            | lapin::Error::InvalidChannelState(_)
            | lapin::Error::IOError(_) => Self::broker_unavailable(err.to_string()),
            other => Self::internal(format!("AMQP error: {other}")),
        }
    }
}

impl From<reqwest::Error> for MessagingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            return Self::broker_unavailable(format!("management API unreachable: {err}"));
        }
        Self::management(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
