//! DLQ retry flows: single-message and bulk retry against real failed jobs.

mod common;

use analytics_migrator::messaging::headers::{FAILURE_KIND, RETRY_ATTEMPT, RETRY_COUNT};
use analytics_migrator::models::{ProcessType, StatusConfidence};
use analytics_migrator::pipeline::{DispatchOutcome, JobDone};
use analytics_migrator::retry::{FailedQueueQuery, RetryService, SingleRetryOutcome};
use analytics_migrator::status::StatusAggregator;

use common::*;

fn retry_service(harness: &TestHarness) -> RetryService {
    RetryService::new(harness.ctx.messaging.clone(), 100, 1000)
}

/// Enqueue one download per period and let every one of them time out
async fn fail_downloads(harness: &TestHarness, periods: &[&str]) -> Vec<String> {
    let config = harness
        .ctx
        .load_config(CONFIG_ID)
        .await
        .expect("config registered");
    harness
        .source()
        .fail_analytics_with(timeout_error("https://source.example.org/api/analytics"));
    let report = harness
        .ctx
        .producer()
        .enqueue_data_download(&config, &runtime(periods))
        .await
        .unwrap();
    for outcome in harness.drain(ProcessType::DataDownload).await {
        assert!(matches!(outcome, DispatchOutcome::DeadLettered(_)));
    }
    report.message_ids
}

#[tokio::test]
async fn test_single_retry_republishes_and_completes() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    let ids = fail_downloads(&harness, &[PERIOD]).await;
    let retry = retry_service(&harness);

    harness.source().clear_analytics_failure();
    let outcome = retry.retry_single_message(CONFIG_ID, &ids[0]).await.unwrap();
    assert_eq!(
        outcome,
        SingleRetryOutcome::Retried {
            message_id: ids[0].clone(),
            queue: harness.queues.data_download.clone(),
        }
    );
    assert!(harness.failed().is_empty());

    let queued = harness.broker.messages(&harness.queues.data_download);
    assert_eq!(queued.len(), 1);
    assert!(queued[0].has_id(&ids[0]));
    assert_eq!(queued[0].header_u64(RETRY_COUNT), Some(1));
    assert!(queued[0].headers.contains_key(RETRY_ATTEMPT));
    assert!(queued[0].header_str(FAILURE_KIND).is_none());

    let outcome = harness.deliver_next(ProcessType::DataDownload).await;
    assert_eq!(outcome, DispatchOutcome::Completed(JobDone::Empty));
}

#[tokio::test]
async fn test_single_retry_keeps_message_when_republish_fails() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    let ids = fail_downloads(&harness, &[PERIOD]).await;
    let retry = retry_service(&harness);

    harness.broker.fail_publishes_to(&harness.queues.data_download);
    let outcome = retry.retry_single_message(CONFIG_ID, &ids[0]).await.unwrap();
    assert!(matches!(outcome, SingleRetryOutcome::Failed { .. }));

    let failed = harness.failed();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].has_id(&ids[0]));
    assert_eq!(harness.queue_length(ProcessType::DataDownload), 0);

    harness.broker.restore_publishes_to(&harness.queues.data_download);
    let outcome = retry.retry_single_message(CONFIG_ID, &ids[0]).await.unwrap();
    assert!(matches!(outcome, SingleRetryOutcome::Retried { .. }));
}

#[tokio::test]
async fn test_single_retry_preserves_other_messages_in_order() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    let ids = fail_downloads(&harness, &["202401", "202402", "202403"]).await;
    let retry = retry_service(&harness);

    let outcome = retry.retry_single_message(CONFIG_ID, &ids[2]).await.unwrap();
    assert!(matches!(outcome, SingleRetryOutcome::Retried { .. }));

    let remaining: Vec<Option<String>> = harness
        .failed()
        .into_iter()
        .map(|m| m.message_id)
        .collect();
    assert_eq!(remaining, vec![Some(ids[0].clone()), Some(ids[1].clone())]);
}

#[tokio::test]
async fn test_unknown_message_is_not_found() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    fail_downloads(&harness, &[PERIOD]).await;
    let retry = retry_service(&harness);

    let outcome = retry
        .retry_single_message(CONFIG_ID, "no-such-message")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SingleRetryOutcome::NotFound {
            message_id: "no-such-message".into()
        }
    );
    assert_eq!(harness.failed().len(), 1);
}

#[tokio::test]
async fn test_bulk_retry_moves_at_most_max_retries() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    fail_downloads(&harness, &["202401", "202402", "202403"]).await;
    let retry = retry_service(&harness);

    let summary = retry.retry_bulk(CONFIG_ID, 2, None).await.unwrap();
    assert_eq!(summary.total_attempted, 2);
    assert_eq!(summary.successful_retries, 2);
    assert_eq!(summary.failed_retries, 0);
    assert_eq!(harness.failed().len(), 1);
    assert_eq!(harness.queue_length(ProcessType::DataDownload), 2);
}

#[tokio::test]
async fn test_bulk_retry_returns_messages_when_republish_fails() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    let ids = fail_downloads(&harness, &["202401", "202402"]).await;
    let retry = retry_service(&harness);

    harness.broker.fail_publishes_to(&harness.queues.data_download);
    let summary = retry.retry_bulk(CONFIG_ID, 10, None).await.unwrap();
    assert_eq!(summary.total_attempted, 2);
    assert_eq!(summary.successful_retries, 0);
    assert_eq!(summary.failed_retries, 2);

    let remaining: Vec<Option<String>> = harness
        .failed()
        .into_iter()
        .map(|m| m.message_id)
        .collect();
    assert_eq!(remaining.len(), 2);
    for id in &ids {
        assert!(remaining.contains(&Some(id.clone())));
    }
    assert_eq!(harness.queue_length(ProcessType::DataDownload), 0);

    harness.broker.restore_publishes_to(&harness.queues.data_download);
    let summary = retry.retry_bulk(CONFIG_ID, 10, None).await.unwrap();
    assert_eq!(summary.successful_retries, 2);
    assert!(harness.failed().is_empty());
}

#[tokio::test]
async fn test_bulk_retry_skips_fatal_but_single_retry_allows_it() {
    let config = migration_config(CONFIG_ID, vec![attribute_item("attr-item", 1, &["optA"])]);
    let harness = TestHarness::new(config.clone()).await;
    harness
        .source()
        .respond_with_rows(rows(&[["src0", PERIOD, "ou1", "1"]]));
    let report = harness
        .ctx
        .producer()
        .enqueue_data_download(&config, &runtime(&[PERIOD]))
        .await
        .unwrap();
    harness.deliver_next(ProcessType::DataDownload).await;
    assert_eq!(harness.failed()[0].header_str(FAILURE_KIND), Some("fatal"));

    let retry = retry_service(&harness);
    let summary = retry.retry_bulk(CONFIG_ID, 10, None).await.unwrap();
    assert_eq!(summary.total_attempted, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(harness.failed().len(), 1);

    // Fixing the destination makes the explicit retry worthwhile
    harness.destination().add_combo("optA", "aocA");
    let outcome = retry
        .retry_single_message(CONFIG_ID, &report.message_ids[0])
        .await
        .unwrap();
    assert!(matches!(outcome, SingleRetryOutcome::Retried { .. }));
    assert!(matches!(
        harness.deliver_next(ProcessType::DataDownload).await,
        DispatchOutcome::Completed(JobDone::UploadEnqueued { records: 1, .. })
    ));
}

#[tokio::test]
async fn test_bulk_retry_filters_by_process_type() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    fail_downloads(&harness, &[PERIOD]).await;
    let retry = retry_service(&harness);

    let summary = retry
        .retry_bulk(CONFIG_ID, 10, Some(ProcessType::DataUpload))
        .await
        .unwrap();
    assert_eq!(summary.total_attempted, 0);
    assert_eq!(summary.skipped, 1);

    let summary = retry
        .retry_bulk(CONFIG_ID, 10, Some(ProcessType::DataDownload))
        .await
        .unwrap();
    assert_eq!(summary.successful_retries, 1);
    assert!(harness.failed().is_empty());
}

#[tokio::test]
async fn test_find_and_list_failed_messages() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    let ids = fail_downloads(&harness, &["202401", "202402"]).await;
    let retry = retry_service(&harness);

    let found = retry
        .find_message(CONFIG_ID, &ids[1])
        .await
        .unwrap()
        .expect("message in DLQ");
    assert_eq!(found.position, 1);
    assert_eq!(found.process_type, Some(ProcessType::DataDownload));
    assert_eq!(found.failure_kind.as_deref(), Some("retryable"));
    assert!(found.payload.is_some());
    assert!(retry.find_message(CONFIG_ID, "missing").await.unwrap().is_none());

    let listing = retry
        .list_failed(
            CONFIG_ID,
            &FailedQueueQuery {
                queue: Some("data-download".into()),
                ..FailedQueueQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.total, 2);
    assert_eq!(listing.counts.get(&harness.queues.data_download), Some(&2));
    assert!(!listing.truncated);
    let messages = listing.messages.expect("messages listed");
    assert!(messages.iter().all(|m| m.payload.is_none()));

    let listing = retry
        .list_failed(
            CONFIG_ID,
            &FailedQueueQuery {
                queue: Some("data-upload".into()),
                ..FailedQueueQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.total, 0);
}

#[tokio::test]
async fn test_status_reports_failures_by_origin() {
    let harness = TestHarness::new(migration_config(CONFIG_ID, vec![dx_item("anc", 1)])).await;
    fail_downloads(&harness, &["202401", "202402"]).await;
    let config = harness.ctx.load_config(CONFIG_ID).await.unwrap();
    harness
        .ctx
        .producer()
        .enqueue_metadata_download(&config, &runtime(&[]))
        .await
        .unwrap();

    let aggregator = StatusAggregator::new(
        harness.ctx.messaging.clone(),
        harness.ctx.progress.clone(),
        retry_service(&harness),
        1000,
    );
    let status = aggregator.status(CONFIG_ID).await.unwrap();

    let download = status.process(ProcessType::DataDownload).unwrap();
    assert_eq!(download.failed, 2);
    assert_eq!(download.queued, 0);
    assert_eq!(download.confidence, StatusConfidence::Approximate);

    let metadata = status.process(ProcessType::MetadataDownload).unwrap();
    assert_eq!(metadata.queued, 1);
    assert_eq!(metadata.failed, 0);
    assert_eq!(metadata.confidence, StatusConfidence::Exact);
    assert!(!status.failed_truncated);
}
