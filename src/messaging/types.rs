//! # Messaging Types
//!
//! Provider-agnostic message, delivery and statistics types.

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::errors::MessagingResult;
use super::headers;

/// Broker-level message identifier, stable across retries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type MessageHeaders = BTreeMap<String, serde_json::Value>;

/// A message as published to, or read back from, a queue
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    pub message_id: Option<String>,
    pub headers: MessageHeaders,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

impl BrokerMessage {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            message_id: Some(MessageId::generate().0),
            headers: MessageHeaders::new(),
            body,
            redelivered: false,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.as_str())
    }

    /// Numeric header, tolerating values that were stringified in transit
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        match self.headers.get(name)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Queue the message failed in: the router's annotation, else the broker's
    pub fn origin_queue(&self) -> Option<&str> {
        self.header_str(headers::ORIGINAL_QUEUE)
            .or_else(|| self.header_str(headers::FIRST_DEATH_QUEUE))
            .filter(|q| !q.is_empty())
    }

    pub fn retry_count(&self) -> u64 {
        self.header_u64(headers::RETRY_COUNT).unwrap_or(0)
    }

    /// Body decoded as JSON, or as a string when it is not valid JSON
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&self.body).into_owned())
        })
    }

    pub fn has_id(&self, message_id: &str) -> bool {
        self.message_id.as_deref() == Some(message_id)
    }
}

/// A message handed to a consumer, with the handle needed to settle it
#[derive(Debug)]
pub struct Delivery {
    pub message: BrokerMessage,
    pub handle: DeliveryHandle,
}

pub enum DeliveryHandle {
    RabbitMq {
        queue_name: String,
        delivery_tag: u64,
        acker: lapin::acker::Acker,
    },
    InMemory {
        queue_name: String,
        id: u64,
    },
}

impl DeliveryHandle {
    pub fn queue_name(&self) -> &str {
        match self {
            DeliveryHandle::RabbitMq { queue_name, .. } => queue_name,
            DeliveryHandle::InMemory { queue_name, .. } => queue_name,
        }
    }
}

impl fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryHandle::RabbitMq {
                queue_name,
                delivery_tag,
                ..
            } => f
                .debug_struct("RabbitMq")
                .field("queue_name", queue_name)
                .field("delivery_tag", delivery_tag)
                .finish_non_exhaustive(),
            DeliveryHandle::InMemory { queue_name, id } => f
                .debug_struct("InMemory")
                .field("queue_name", queue_name)
                .field("id", id)
                .finish(),
        }
    }
}

pub type DeliveryStream = Pin<Box<dyn Stream<Item = MessagingResult<Delivery>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queue_name: String,
    /// Ready plus unacknowledged messages
    pub message_count: u64,
    pub consumer_count: u64,
}

/// Declaration of a durable queue, optionally dead-lettering into another queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub dead_letter_queue: Option<String>,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dead_letter_queue: None,
        }
    }

    pub fn dead_lettering_to(mut self, dead_letter_queue: impl Into<String>) -> Self {
        self.dead_letter_queue = Some(dead_letter_queue.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_queue_prefers_router_annotation() {
        let message = BrokerMessage::new(b"{}".to_vec())
            .with_header(headers::FIRST_DEATH_QUEUE, "broker-side")
            .with_header(headers::ORIGINAL_QUEUE, "router-side");
        assert_eq!(message.origin_queue(), Some("router-side"));

        let fallback = BrokerMessage::new(b"{}".to_vec())
            .with_header(headers::FIRST_DEATH_QUEUE, "broker-side");
        assert_eq!(fallback.origin_queue(), Some("broker-side"));

        assert_eq!(BrokerMessage::new(vec![]).origin_queue(), None);
    }

    #[test]
    fn test_retry_count_reads_strings_and_numbers() {
        let numeric = BrokerMessage::new(vec![]).with_header(headers::RETRY_COUNT, 2);
        let text = BrokerMessage::new(vec![]).with_header(headers::RETRY_COUNT, "3");
        assert_eq!(numeric.retry_count(), 2);
        assert_eq!(text.retry_count(), 3);
        assert_eq!(BrokerMessage::new(vec![]).retry_count(), 0);
    }

    #[test]
    fn test_body_json_falls_back_to_text() {
        let message = BrokerMessage::new(b"not json".to_vec());
        assert_eq!(message.body_json(), serde_json::json!("not json"));
    }
}
