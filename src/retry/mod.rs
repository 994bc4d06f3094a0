//! # Retry Subsystem
//!
//! Moves DLQ entries back to the work queue they failed in. Every operation is
//! composed from the two broker primitives: a non-destructive `peek` and a
//! destructive `take`. Any message taken from the DLQ that is not successfully
//! republished is put back into the DLQ, so a failed retry never loses it.
//!
//! Single-message retry takes every message up to the target and re-inserts the
//! ones before it. A crash between the take and the re-insert can lose or
//! duplicate those preceding messages; this is an accepted at-least-once
//! limitation of the peek/take model.

pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::error::MigratorResult;
use crate::messaging::headers::{FAILURE_HEADERS, FAILURE_KIND, RETRIED_AT, RETRY_ATTEMPT, RETRY_COUNT};
use crate::messaging::{queue_names_for, BrokerMessage, MessagingProvider, MessagingResult, QueueSet};
use crate::models::ProcessType;
use crate::pipeline::FailureKind;

pub use types::{
    FailedMessage, FailedQueueListing, FailedQueueQuery, RetryFailure, RetrySummary,
    SingleRetryOutcome, UNKNOWN_ORIGIN,
};

/// DLQ messages read in one window, and whether the DLQ held more
#[derive(Debug, Clone)]
pub struct FailedScan {
    pub messages: Vec<BrokerMessage>,
    pub truncated: bool,
}

impl FailedScan {
    /// Count of scanned messages per origin work queue
    pub fn counts_by_origin(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for message in &self.messages {
            let origin = message.origin_queue().unwrap_or(UNKNOWN_ORIGIN);
            *counts.entry(origin.to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct RetryService {
    messaging: Arc<MessagingProvider>,
    scan_window: usize,
    scan_limit: usize,
}

impl RetryService {
    /// `scan_window` bounds single-message searches; `scan_limit` bounds listings
    pub fn new(messaging: Arc<MessagingProvider>, scan_window: usize, scan_limit: usize) -> Self {
        Self {
            messaging,
            scan_window,
            scan_limit,
        }
    }

    /// Peek up to `limit` DLQ messages without consuming them
    pub async fn scan_failed(&self, queues: &QueueSet, limit: usize) -> MessagingResult<FailedScan> {
        let messages = self.messaging.peek(&queues.failed, limit).await?;
        let truncated = if messages.len() >= limit {
            self.messaging.queue_stats(&queues.failed).await?.message_count > messages.len() as u64
        } else {
            false
        };
        Ok(FailedScan {
            messages,
            truncated,
        })
    }

    /// Retry up to `max_retries` DLQ messages, optionally only those of one process type
    #[instrument(skip(self))]
    pub async fn retry_bulk(
        &self,
        config_id: &str,
        max_retries: usize,
        process_type: Option<ProcessType>,
    ) -> MigratorResult<RetrySummary> {
        let queues = queue_names_for(config_id)?;
        let only_queue = process_type.map(|p| queues.for_process(p).to_string());
        let mut summary = RetrySummary::default();

        let window = self.messaging.peek(&queues.failed, max_retries).await?.len();

        for _ in 0..window {
            let Some(message) = self.messaging.take(&queues.failed, 1).await?.pop() else {
                break;
            };

            let origin = message.origin_queue().map(str::to_string);
            let filtered_out = match (&only_queue, &origin) {
                (Some(wanted), Some(origin)) => wanted != origin,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if filtered_out || is_fatal(&message) {
                summary.skipped += 1;
                self.reinsert(&queues, &message).await;
                continue;
            }

            summary.total_attempted += 1;
            let Some(origin) = origin.filter(|o| queues.process_for_queue(o).is_some()) else {
                summary.failed_retries += 1;
                summary.failures.push(RetryFailure {
                    message_id: message.message_id.clone(),
                    reason: "message has no origin queue".into(),
                });
                self.reinsert(&queues, &message).await;
                continue;
            };

            match self.messaging.publish(&origin, &retry_copy(&message)).await {
                Ok(_) => summary.successful_retries += 1,
                Err(e) => {
                    warn!(queue = %origin, error = %e, "Republish failed; message returned to DLQ");
                    summary.failed_retries += 1;
                    summary.failures.push(RetryFailure {
                        message_id: message.message_id.clone(),
                        reason: e.to_string(),
                    });
                    self.reinsert(&queues, &message).await;
                }
            }
        }

        info!(
            attempted = summary.total_attempted,
            succeeded = summary.successful_retries,
            failed = summary.failed_retries,
            skipped = summary.skipped,
            "🔁 Bulk retry finished"
        );
        Ok(summary)
    }

    /// Retry one DLQ message by id, regardless of its failure kind
    #[instrument(skip(self))]
    pub async fn retry_single_message(
        &self,
        config_id: &str,
        message_id: &str,
    ) -> MigratorResult<SingleRetryOutcome> {
        let queues = queue_names_for(config_id)?;
        let peeked = self.messaging.peek(&queues.failed, self.scan_window).await?;
        let Some(index) = peeked.iter().position(|m| m.has_id(message_id)) else {
            return Ok(SingleRetryOutcome::NotFound {
                message_id: message_id.to_string(),
            });
        };

        let mut taken = self.messaging.take(&queues.failed, index + 1).await?;
        let Some(position) = taken.iter().position(|m| m.has_id(message_id)) else {
            // DLQ changed between peek and take; restore what was taken
            for message in &taken {
                self.reinsert(&queues, message).await;
            }
            return Ok(SingleRetryOutcome::NotFound {
                message_id: message_id.to_string(),
            });
        };
        let target = taken.remove(position);

        for message in &taken {
            self.reinsert(&queues, message).await;
        }

        let Some(origin) = target
            .origin_queue()
            .filter(|o| queues.process_for_queue(o).is_some())
            .map(str::to_string)
        else {
            self.reinsert(&queues, &target).await;
            return Ok(SingleRetryOutcome::Failed {
                message_id: message_id.to_string(),
                reason: "message has no origin queue".into(),
            });
        };

        match self.messaging.publish(&origin, &retry_copy(&target)).await {
            Ok(_) => {
                info!(queue = %origin, "🔁 Message retried");
                Ok(SingleRetryOutcome::Retried {
                    message_id: message_id.to_string(),
                    queue: origin,
                })
            }
            Err(e) => {
                warn!(queue = %origin, error = %e, "Republish failed; message returned to DLQ");
                self.reinsert(&queues, &target).await;
                Ok(SingleRetryOutcome::Failed {
                    message_id: message_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// DLQ entry by id, read without changing the queue
    pub async fn find_message(
        &self,
        config_id: &str,
        message_id: &str,
    ) -> MigratorResult<Option<FailedMessage>> {
        let queues = queue_names_for(config_id)?;
        let peeked = self.messaging.peek(&queues.failed, self.scan_window).await?;
        Ok(peeked
            .iter()
            .enumerate()
            .find(|(_, m)| m.has_id(message_id))
            .map(|(position, m)| FailedMessage::from_message(position, m, true)))
    }

    pub async fn list_failed(
        &self,
        config_id: &str,
        query: &FailedQueueQuery,
    ) -> MigratorResult<FailedQueueListing> {
        let queues = queue_names_for(config_id)?;
        let scan = self.scan_failed(&queues, self.scan_limit).await?;

        let matching: Vec<(usize, &BrokerMessage)> = scan
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| matches_queue_filter(m, query.queue.as_deref()))
            .collect();

        let mut counts = BTreeMap::new();
        for (_, message) in &matching {
            let origin = message.origin_queue().unwrap_or(UNKNOWN_ORIGIN);
            *counts.entry(origin.to_string()).or_insert(0) += 1;
        }

        let messages = (!query.only_queues).then(|| {
            matching
                .iter()
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .map(|(position, m)| FailedMessage::from_message(*position, m, query.include_messages))
                .collect()
        });

        Ok(FailedQueueListing {
            config_id: config_id.to_string(),
            queue: queues.failed.clone(),
            total: matching.len(),
            counts,
            truncated: scan.truncated,
            messages,
        })
    }

    #[instrument(skip(self))]
    pub async fn purge_failed(&self, config_id: &str) -> MigratorResult<u64> {
        let queues = queue_names_for(config_id)?;
        let purged = self.messaging.purge_queue(&queues.failed).await?;
        info!(purged, "DLQ purged");
        Ok(purged)
    }

    async fn reinsert(&self, queues: &QueueSet, message: &BrokerMessage) {
        if let Err(e) = self.messaging.publish(&queues.failed, message).await {
            error!(
                dlq = %queues.failed,
                message_id = message.message_id.as_deref().unwrap_or(""),
                body = %String::from_utf8_lossy(&message.body),
                error = %e,
                "Failed to return message to DLQ"
            );
        }
    }
}

fn is_fatal(message: &BrokerMessage) -> bool {
    message
        .header_str(FAILURE_KIND)
        .and_then(|kind| kind.parse::<FailureKind>().ok())
        == Some(FailureKind::Fatal)
}

/// Filter by full origin queue name or by process type name
fn matches_queue_filter(message: &BrokerMessage, filter: Option<&str>) -> bool {
    let Some(filter) = filter.filter(|f| !f.is_empty()) else {
        return true;
    };
    match message.origin_queue() {
        Some(origin) => {
            origin == filter
                || origin
                    .rsplit_once('.')
                    .is_some_and(|(_, suffix)| suffix == filter)
        }
        None => filter == UNKNOWN_ORIGIN,
    }
}

/// The message as republished to its origin queue: same id and body, failure
/// headers stripped, retry counter advanced
pub fn retry_copy(message: &BrokerMessage) -> BrokerMessage {
    let mut copy = message.clone();
    for header in FAILURE_HEADERS {
        copy.headers.remove(*header);
    }
    let attempt = message.retry_count() + 1;
    copy.headers.insert(RETRY_COUNT.to_string(), attempt.into());
    copy.headers.insert(RETRY_ATTEMPT.to_string(), true.into());
    copy.headers
        .insert(RETRIED_AT.to_string(), Utc::now().to_rfc3339().into());
    copy.redelivered = false;
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::headers::ORIGINAL_QUEUE;
    use crate::messaging::{InMemoryMessagingService, MessagingService};

    async fn setup() -> (RetryService, InMemoryMessagingService, QueueSet) {
        let broker = InMemoryMessagingService::new();
        let queues = queue_names_for("cfg").unwrap();
        for spec in queues.specs() {
            broker.ensure_queue(&spec).await.unwrap();
        }
        let service = RetryService::new(Arc::new(broker.clone().into()), 100, 1000);
        (service, broker, queues)
    }

    fn failed(origin: &str, kind: &str) -> BrokerMessage {
        BrokerMessage::new(br#"{"type":"data-upload"}"#.to_vec())
            .with_header(ORIGINAL_QUEUE, origin)
            .with_header(FAILURE_KIND, kind)
    }

    #[test]
    fn test_retry_copy_strips_failure_headers() {
        let message = failed("q", "retryable").with_header(RETRY_COUNT, 1);
        let copy = retry_copy(&message);

        assert_eq!(copy.message_id, message.message_id);
        assert_eq!(copy.origin_queue(), None);
        assert_eq!(copy.header_str(FAILURE_KIND), None);
        assert_eq!(copy.retry_count(), 2);
        assert!(copy.header_str(RETRIED_AT).is_some());
    }

    #[tokio::test]
    async fn test_bulk_retry_skips_fatal_and_other_processes() {
        let (service, broker, queues) = setup().await;
        broker.publish(&queues.failed, &failed(&queues.data_upload, "retryable")).await.unwrap();
        broker.publish(&queues.failed, &failed(&queues.data_upload, "fatal")).await.unwrap();
        broker.publish(&queues.failed, &failed(&queues.data_download, "retryable")).await.unwrap();

        let summary = service
            .retry_bulk("cfg", 10, Some(ProcessType::DataUpload))
            .await
            .unwrap();

        assert_eq!(summary.successful_retries, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(broker.queue_length(&queues.failed), 2);
        assert_eq!(broker.queue_length(&queues.data_upload), 1);
    }

    #[tokio::test]
    async fn test_bulk_retry_without_origin_is_reported_and_kept() {
        let (service, broker, queues) = setup().await;
        broker
            .publish(&queues.failed, &BrokerMessage::new(b"{}".to_vec()))
            .await
            .unwrap();

        let summary = service.retry_bulk("cfg", 10, None).await.unwrap();

        assert_eq!(summary.total_attempted, 1);
        assert_eq!(summary.failed_retries, 1);
        assert_eq!(broker.queue_length(&queues.failed), 1);
    }

    #[tokio::test]
    async fn test_list_failed_filters_and_windows() {
        let (service, broker, queues) = setup().await;
        for _ in 0..3 {
            broker.publish(&queues.failed, &failed(&queues.data_download, "retryable")).await.unwrap();
        }
        broker.publish(&queues.failed, &failed(&queues.metadata_upload, "fatal")).await.unwrap();

        let listing = service
            .list_failed(
                "cfg",
                &FailedQueueQuery {
                    limit: Some(2),
                    offset: 1,
                    queue: Some("data-download".into()),
                    ..FailedQueueQuery::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(listing.total, 3);
        assert_eq!(listing.counts[&queues.data_download], 3);
        let messages = listing.messages.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].position, 1);
        assert!(messages[0].payload.is_none());
        assert_eq!(messages[0].process_type, Some(ProcessType::DataDownload));
    }
}
