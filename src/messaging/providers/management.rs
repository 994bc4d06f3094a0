//! # RabbitMQ Management API Client
//!
//! AMQP has no way to read a queue without consuming it, so DLQ inspection goes
//! through the management plugin's HTTP API. The `get` endpoint's `ackmode`
//! selects the two primitives: `ack_requeue_true` peeks, `ack_requeue_false` takes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RabbitMqConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::types::{BrokerMessage, MessageHeaders, QueueStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Non-destructive read
    Requeue,
    /// Destructive read
    Remove,
}

impl AckMode {
    fn as_str(&self) -> &'static str {
        match self {
            AckMode::Requeue => "ack_requeue_true",
            AckMode::Remove => "ack_requeue_false",
        }
    }
}

#[derive(Debug, Serialize)]
struct GetMessagesRequest<'a> {
    count: usize,
    ackmode: &'a str,
    encoding: &'a str,
}

#[derive(Debug, Deserialize)]
struct ManagementMessage {
    payload: String,
    #[serde(default)]
    payload_encoding: String,
    #[serde(default)]
    redelivered: bool,
    #[serde(default)]
    properties: ManagementProperties,
}

#[derive(Debug, Default, Deserialize)]
struct ManagementProperties {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    headers: MessageHeaders,
}

#[derive(Debug, Deserialize)]
struct QueueInfo {
    #[serde(default)]
    messages: u64,
    #[serde(default)]
    consumers: u64,
}

#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    base_url: String,
    vhost: String,
    username: String,
    password: String,
}

impl ManagementClient {
    pub fn new(config: &RabbitMqConfig) -> MessagingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.management_timeout())
            .build()
            .map_err(|e| MessagingError::configuration("rabbitmq.management", e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.management_url.trim_end_matches('/').to_string(),
            vhost: config.vhost.clone(),
            username: config.management_username.clone(),
            password: config.management_password.clone(),
        })
    }

    fn queue_url(&self, queue_name: &str) -> String {
        format!(
            "{}/api/queues/{}/{}",
            self.base_url,
            urlencoding::encode(&self.vhost),
            urlencoding::encode(queue_name)
        )
    }

    pub async fn get_messages(
        &self,
        queue_name: &str,
        count: usize,
        mode: AckMode,
    ) -> MessagingResult<Vec<BrokerMessage>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/get", self.queue_url(queue_name));
        debug!(queue = %queue_name, count, ackmode = mode.as_str(), "Management API get");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&GetMessagesRequest {
                count,
                ackmode: mode.as_str(),
                encoding: "auto",
            })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MessagingError::queue_not_found(queue_name));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::management(Some(status.as_u16()), body));
        }

        let messages: Vec<ManagementMessage> = response.json().await?;
        messages.into_iter().map(into_broker_message).collect()
    }

    pub async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        let response = self
            .http
            .get(self.queue_url(queue_name))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MessagingError::queue_not_found(queue_name));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::management(Some(status.as_u16()), body));
        }

        let info: QueueInfo = response.json().await?;
        Ok(QueueStats {
            queue_name: queue_name.to_string(),
            message_count: info.messages,
            consumer_count: info.consumers,
        })
    }
}

fn into_broker_message(message: ManagementMessage) -> MessagingResult<BrokerMessage> {
    if message.payload_encoding == "base64" {
        return Err(MessagingError::message_deserialization(
            "management API returned a binary payload; job bodies are JSON text",
        ));
    }
    Ok(BrokerMessage {
        message_id: message.properties.message_id,
        headers: message.properties.headers,
        body: message.payload.into_bytes(),
        redelivered: message.redelivered,
    })
}
