//! # RabbitMQ Messaging Service
//!
//! RabbitMQ implementation of [`MessagingService`] using `lapin` for AMQP and the
//! management HTTP API for queue inspection.
//!
//! ## Features
//!
//! - **Durable queues, persistent messages**: delivery mode 2 on every publish
//! - **Publisher confirms**: `publish` returns only after the broker acks the message
//! - **Dead-letter routing**: work queues declare `x-dead-letter-exchange` = default
//!   exchange and `x-dead-letter-routing-key` = the config's DLQ, so a rejected
//!   delivery lands in the DLQ with `x-first-death-queue` set by the broker
//! - **One channel per consumer**, each with its own prefetch limit

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions, QueueDeleteOptions, QueuePurgeOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info, warn};

use super::management::{AckMode, ManagementClient};
use crate::config::RabbitMqConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::traits::MessagingService;
use crate::messaging::types::{
    BrokerMessage, Delivery, DeliveryHandle, DeliveryStream, MessageHeaders, MessageId, QueueSpec,
    QueueStats,
};

pub struct RabbitMqMessagingService {
    connection: Connection,
    /// Publisher channel, in confirm mode
    channel: Channel,
    management: ManagementClient,
    config: RabbitMqConfig,
}

impl std::fmt::Debug for RabbitMqMessagingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqMessagingService")
            .field("url", &self.connection_url_redacted())
            .field("vhost", &self.config.vhost)
            .field("prefetch_count", &self.config.prefetch_count)
            .finish_non_exhaustive()
    }
}

impl RabbitMqMessagingService {
    pub async fn connect(config: &RabbitMqConfig) -> MessagingResult<Self> {
        let connection = Connection::connect(
            &config.url,
            ConnectionProperties::default().with_connection_name("analytics-migrator".into()),
        )
        .await
        .map_err(|e| MessagingError::broker_unavailable(format!("RabbitMQ connection failed: {e}")))?;

        let channel = connection.create_channel().await.map_err(|e| {
            MessagingError::broker_unavailable(format!("RabbitMQ channel creation failed: {e}"))
        })?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| MessagingError::configuration("rabbitmq", format!("confirm mode: {e}")))?;

        let service = Self {
            connection,
            channel,
            management: ManagementClient::new(config)?,
            config: config.clone(),
        };

        info!(
            url = %service.connection_url_redacted(),
            prefetch = service.config.prefetch_count,
            "🐇 Connected to RabbitMQ"
        );
        Ok(service)
    }

    /// Scheme only, never credentials
    pub fn connection_url_redacted(&self) -> &str {
        match self.config.url.find("://") {
            Some(end) => &self.config.url[..end + 3],
            None => "amqp://...",
        }
    }

    fn dead_letter_args(spec: &QueueSpec) -> FieldTable {
        let mut args = FieldTable::default();
        if let Some(dlq) = &spec.dead_letter_queue {
            args.insert(
                "x-dead-letter-exchange".into(),
                AMQPValue::LongString(String::new().into()),
            );
            args.insert(
                "x-dead-letter-routing-key".into(),
                AMQPValue::LongString(dlq.clone().into()),
            );
        }
        args
    }
}

#[async_trait]
impl MessagingService for RabbitMqMessagingService {
    async fn ensure_queue(&self, spec: &QueueSpec) -> MessagingResult<()> {
        self.channel
            .queue_declare(
                &spec.name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                Self::dead_letter_args(spec),
            )
            .await
            .map_err(|e| MessagingError::queue_operation(&spec.name, "declare", e.to_string()))?;
        debug!(queue = %spec.name, dlq = ?spec.dead_letter_queue, "Queue declared");
        Ok(())
    }

    async fn delete_queue(&self, queue_name: &str) -> MessagingResult<()> {
        self.channel
            .queue_delete(queue_name, QueueDeleteOptions::default())
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "delete", e.to_string()))?;
        Ok(())
    }

    async fn purge_queue(&self, queue_name: &str) -> MessagingResult<u64> {
        let purged = self
            .channel
            .queue_purge(queue_name, QueuePurgeOptions::default())
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "purge", e.to_string()))?;
        Ok(u64::from(purged))
    }

    async fn publish(&self, queue_name: &str, message: &BrokerMessage) -> MessagingResult<MessageId> {
        let message_id = message
            .message_id
            .clone()
            .unwrap_or_else(|| MessageId::generate().0);

        let properties = BasicProperties::default()
            .with_delivery_mode(2)
            .with_content_type("application/json".into())
            .with_message_id(message_id.clone().into())
            .with_timestamp(chrono::Utc::now().timestamp().max(0) as u64)
            .with_headers(headers_to_field_table(&message.headers));

        let confirm = self
            .channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                &message.body,
                properties,
            )
            .await
            .map_err(|e| match MessagingError::from(e) {
                err @ MessagingError::BrokerUnavailable { .. } => err,
                other => MessagingError::publish(queue_name, other.to_string()),
            })?;

        match confirm
            .await
            .map_err(|e| MessagingError::publish(queue_name, format!("confirmation failed: {e}")))?
        {
            Confirmation::Ack(None) | Confirmation::NotRequested => Ok(MessageId(message_id)),
            Confirmation::Ack(Some(_)) => Err(MessagingError::queue_not_found(queue_name)),
            Confirmation::Nack(_) => Err(MessagingError::publish(queue_name, "broker nacked the publish")),
        }
    }

    async fn subscribe(&self, queue_name: &str, consumer_tag: &str) -> MessagingResult<DeliveryStream> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "consume", e.to_string()))?;

        let queue = queue_name.to_string();
        let stream = consumer.map(move |result| {
            // The consumer channel lives as long as the stream
            let _channel = &channel;
            result
                .map(|delivery| Delivery {
                    message: BrokerMessage {
                        message_id: delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|id| id.as_str().to_string()),
                        headers: delivery
                            .properties
                            .headers()
                            .as_ref()
                            .map(field_table_to_headers)
                            .unwrap_or_default(),
                        body: delivery.data,
                        redelivered: delivery.redelivered,
                    },
                    handle: DeliveryHandle::RabbitMq {
                        queue_name: queue.clone(),
                        delivery_tag: delivery.delivery_tag,
                        acker: delivery.acker,
                    },
                })
                .map_err(MessagingError::from)
        });

        Ok(Box::pin(stream))
    }

    async fn ack(&self, handle: &DeliveryHandle) -> MessagingResult<()> {
        match handle {
            DeliveryHandle::RabbitMq {
                queue_name, acker, ..
            } => acker
                .ack(BasicAckOptions::default())
                .await
                .map(|_| ())
                .map_err(|e| MessagingError::acknowledge(queue_name, e.to_string())),
            other => Err(MessagingError::internal(format!(
                "RabbitMQ cannot ack foreign delivery {other:?}"
            ))),
        }
    }

    async fn nack(&self, handle: &DeliveryHandle, requeue: bool) -> MessagingResult<()> {
        match handle {
            DeliveryHandle::RabbitMq {
                queue_name, acker, ..
            } => acker
                .nack(BasicNackOptions {
                    requeue,
                    ..Default::default()
                })
                .await
                .map(|_| ())
                .map_err(|e| MessagingError::acknowledge(queue_name, e.to_string())),
            other => Err(MessagingError::internal(format!(
                "RabbitMQ cannot nack foreign delivery {other:?}"
            ))),
        }
    }

    async fn peek(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        self.management
            .get_messages(queue_name, count, AckMode::Requeue)
            .await
    }

    async fn take(&self, queue_name: &str, count: usize) -> MessagingResult<Vec<BrokerMessage>> {
        self.management
            .get_messages(queue_name, count, AckMode::Remove)
            .await
    }

    async fn queue_stats(&self, queue_name: &str) -> MessagingResult<QueueStats> {
        self.management.queue_stats(queue_name).await
    }

    async fn health_check(&self) -> MessagingResult<bool> {
        if self.connection.status().connected() {
            Ok(true)
        } else {
            warn!("RabbitMQ connection is not connected");
            Err(MessagingError::broker_unavailable(
                "RabbitMQ connection is not connected",
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        "rabbitmq"
    }
}

fn json_to_amqp(value: &serde_json::Value) -> AMQPValue {
    match value {
        serde_json::Value::Null => AMQPValue::Void,
        serde_json::Value::Bool(b) => AMQPValue::Boolean(*b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => AMQPValue::LongLongInt(i),
            (None, Some(f)) => AMQPValue::Double(f),
            (None, None) => AMQPValue::LongString(n.to_string().into()),
        },
        serde_json::Value::String(s) => AMQPValue::LongString(s.clone().into()),
        // Nested structures travel as JSON text
        other => AMQPValue::LongString(other.to_string().into()),
    }
}

fn amqp_to_json(value: &AMQPValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        AMQPValue::Boolean(b) => Value::Bool(*b),
        AMQPValue::ShortShortInt(v) => Value::from(*v),
        AMQPValue::ShortShortUInt(v) => Value::from(*v),
        AMQPValue::ShortInt(v) => Value::from(*v),
        AMQPValue::ShortUInt(v) => Value::from(*v),
        AMQPValue::LongInt(v) => Value::from(*v),
        AMQPValue::LongUInt(v) => Value::from(*v),
        AMQPValue::LongLongInt(v) => Value::from(*v),
        AMQPValue::Timestamp(v) => Value::from(*v),
        AMQPValue::Float(v) => Value::from(f64::from(*v)),
        AMQPValue::Double(v) => Value::from(*v),
        AMQPValue::ShortString(s) => Value::String(s.as_str().to_string()),
        AMQPValue::LongString(s) => Value::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::FieldArray(items) => Value::Array(items.as_slice().iter().map(amqp_to_json).collect()),
        AMQPValue::FieldTable(table) => Value::Object(
            table
                .inner()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), amqp_to_json(v)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn headers_to_field_table(headers: &MessageHeaders) -> FieldTable {
    let mut table = FieldTable::default();
    for (name, value) in headers {
        table.insert(ShortString::from(name.clone()), json_to_amqp(value));
    }
    table
}

fn field_table_to_headers(table: &FieldTable) -> MessageHeaders {
    table
        .inner()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), amqp_to_json(v)))
        .collect()
}
