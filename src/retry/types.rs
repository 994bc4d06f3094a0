//! Reporting views of DLQ entries and retry results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::messaging::headers::{
    DEATH_REASON, DEATH_TIMESTAMP, ERROR_BODY, ERROR_MESSAGE, FAILURE_KIND, FIRST_DEATH_REASON,
    HTTP_STATUS, HTTP_URL,
};
use crate::messaging::{parse_work_queue, BrokerMessage, MessageHeaders};
use crate::models::ProcessType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySummary {
    pub total_attempted: u64,
    pub successful_retries: u64,
    pub failed_retries: u64,
    /// Left in the DLQ without an attempt: fatal failures or another process type
    pub skipped: u64,
    pub failures: Vec<RetryFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryFailure {
    pub message_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SingleRetryOutcome {
    #[serde(rename_all = "camelCase")]
    Retried { message_id: String, queue: String },
    #[serde(rename_all = "camelCase")]
    NotFound { message_id: String },
    /// Message is back in the DLQ
    #[serde(rename_all = "camelCase")]
    Failed { message_id: String, reason: String },
}

/// A DLQ entry with its diagnostics pulled out of the headers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMessage {
    pub message_id: Option<String>,
    /// Zero-based position in the DLQ at read time
    pub position: usize,
    pub origin_queue: Option<String>,
    pub process_type: Option<ProcessType>,
    pub failure_kind: Option<String>,
    pub death_reason: Option<String>,
    pub death_timestamp: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u64,
    pub http_status: Option<u64>,
    pub http_url: Option<String>,
    pub error_body: Option<String>,
    pub headers: MessageHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl FailedMessage {
    pub fn from_message(position: usize, message: &BrokerMessage, with_payload: bool) -> Self {
        let text = |name: &str| message.header_str(name).map(str::to_string);
        let origin_queue = message.origin_queue().map(str::to_string);

        Self {
            message_id: message.message_id.clone(),
            position,
            process_type: origin_queue
                .as_deref()
                .and_then(parse_work_queue)
                .map(|(_, process)| process),
            origin_queue,
            failure_kind: text(FAILURE_KIND),
            death_reason: text(DEATH_REASON).or_else(|| text(FIRST_DEATH_REASON)),
            death_timestamp: text(DEATH_TIMESTAMP),
            error_message: text(ERROR_MESSAGE),
            retry_count: message.retry_count(),
            http_status: message.header_u64(HTTP_STATUS),
            http_url: text(HTTP_URL),
            error_body: text(ERROR_BODY),
            headers: message.headers.clone(),
            payload: with_payload.then(|| message.body_json()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedQueueQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    /// Include each message's job payload
    #[serde(default)]
    pub include_messages: bool,
    /// Only the per-origin-queue counts
    #[serde(default)]
    pub only_queues: bool,
    /// Origin queue name or process type to filter on
    #[serde(default)]
    pub queue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedQueueListing {
    pub config_id: String,
    pub queue: String,
    /// Entries matching the filter within the scanned window
    pub total: usize,
    /// Per origin queue; entries without an origin are counted under `unknown`
    pub counts: BTreeMap<String, u64>,
    /// DLQ holds more messages than were scanned
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<FailedMessage>>,
}

pub const UNKNOWN_ORIGIN: &str = "unknown";
