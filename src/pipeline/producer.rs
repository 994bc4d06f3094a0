//! # Job Producer
//!
//! Turns a migration request into queue messages. Data jobs are planned up front:
//! an oversized `(data item, period)` pair is enqueued as its paginated sub-jobs,
//! each carrying its override dimensions. Every publish awaits the broker's
//! confirmation; a partial failure is reported as an aggregate error and the
//! already-enqueued jobs stay where they are.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::{MigratorError, MigratorResult};
use crate::messaging::headers::{ENQUEUED_AT, PAGINATED_BY};
use crate::messaging::{BrokerMessage, MessagingError, MessagingProvider, QueueSet};
use crate::models::{
    DataJob, DimensionKey, Job, MetadataJob, MigrationConfig, ProcessType, RuntimeConfig,
};
use crate::planner::{plan, DimensionSpace, PlanRequest, PlanVerdict};
use crate::store::ProgressStore;

/// A job ready to publish, with the dimension it was paginated by, if any
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJob {
    pub job: Job,
    pub paginated_by: Option<DimensionKey>,
}

impl PlannedJob {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            paginated_by: None,
        }
    }

    fn to_message(&self) -> Result<BrokerMessage, MessagingError> {
        let body = self
            .job
            .to_bytes()
            .map_err(|e| MessagingError::message_serialization(e.to_string()))?;
        let mut message =
            BrokerMessage::new(body).with_header(ENQUEUED_AT, Utc::now().to_rfc3339());
        if let Some(dimension) = &self.paginated_by {
            message = message.with_header(PAGINATED_BY, dimension.to_string());
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueReport {
    pub process_type: ProcessType,
    pub enqueued: usize,
    pub message_ids: Vec<String>,
}

#[derive(Clone)]
pub struct JobProducer {
    messaging: Arc<MessagingProvider>,
    progress: Arc<dyn ProgressStore>,
}

impl std::fmt::Debug for JobProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobProducer")
            .field("provider", &self.messaging.provider_name())
            .finish_non_exhaustive()
    }
}

impl JobProducer {
    pub fn new(messaging: Arc<MessagingProvider>, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            messaging,
            progress,
        }
    }

    pub async fn enqueue_data_download(
        &self,
        config: &MigrationConfig,
        runtime: &RuntimeConfig,
    ) -> MigratorResult<EnqueueReport> {
        let jobs = plan_data_jobs(config, runtime, ProcessType::DataDownload)?;
        self.enqueue_jobs(config, ProcessType::DataDownload, jobs).await
    }

    pub async fn enqueue_data_deletion(
        &self,
        config: &MigrationConfig,
        runtime: &RuntimeConfig,
    ) -> MigratorResult<EnqueueReport> {
        let jobs = plan_data_jobs(config, runtime, ProcessType::DataDeletion)?;
        self.enqueue_jobs(config, ProcessType::DataDeletion, jobs).await
    }

    pub async fn enqueue_metadata_download(
        &self,
        config: &MigrationConfig,
        runtime: &RuntimeConfig,
    ) -> MigratorResult<EnqueueReport> {
        let jobs = plan_metadata_jobs(config, runtime)?;
        self.enqueue_jobs(config, ProcessType::MetadataDownload, jobs).await
    }

    async fn enqueue_jobs(
        &self,
        config: &MigrationConfig,
        process: ProcessType,
        jobs: Vec<PlannedJob>,
    ) -> MigratorResult<EnqueueReport> {
        let queues = crate::messaging::queue_names_for(&config.id)?;
        self.enqueue(&queues, process, jobs).await
    }

    /// Publish `jobs` to the `process` queue of `queues` and count them as expected
    #[instrument(skip(self, queues, jobs), fields(config_id = %queues.config_id, process_type = %process, jobs = jobs.len()))]
    pub async fn enqueue(
        &self,
        queues: &QueueSet,
        process: ProcessType,
        jobs: Vec<PlannedJob>,
    ) -> MigratorResult<EnqueueReport> {
        let queue = queues.for_process(process);
        let total = jobs.len();
        let mut message_ids = Vec::with_capacity(total);
        let mut first_error: Option<MessagingError> = None;

        for planned in &jobs {
            let published = match planned.to_message() {
                Ok(message) => self.messaging.publish(queue, &message).await,
                Err(e) => Err(e),
            };
            match published {
                Ok(id) => message_ids.push(id.0),
                Err(e) => {
                    warn!(queue = %queue, job = %planned.job.describe(), error = %e, "Failed to enqueue job");
                    first_error.get_or_insert(e);
                }
            }
        }

        let enqueued = message_ids.len();
        if enqueued > 0 {
            // Jobs are already on the queue; a counter failure must not report them as lost
            if let Err(e) = self
                .progress
                .add_expected(&queues.config_id, process, enqueued as u64)
                .await
            {
                warn!(error = %e, "Failed to record expected jobs");
            }
        }

        match first_error {
            None => {
                info!(queue = %queue, enqueued, "📤 Jobs enqueued");
                Ok(EnqueueReport {
                    process_type: process,
                    enqueued,
                    message_ids,
                })
            }
            Some(e) if enqueued == 0 => Err(e.into()),
            Some(e) => Err(MigratorError::PartialEnqueue {
                process_type: process,
                enqueued,
                failed: total - enqueued,
                first_error: e.to_string(),
            }),
        }
    }
}

/// One job per `(data item, period)` pair, or its paginated sub-jobs
pub fn plan_data_jobs(
    config: &MigrationConfig,
    runtime: &RuntimeConfig,
    process: ProcessType,
) -> MigratorResult<Vec<PlannedJob>> {
    let wrap: fn(DataJob) -> Job = match process {
        ProcessType::DataDownload => Job::DataDownload,
        ProcessType::DataDeletion => Job::DataDeletion,
        other => {
            return Err(MigratorError::Internal(format!(
                "{other} is not a data planning process"
            )))
        }
    };
    let space = match process {
        ProcessType::DataDeletion => DimensionSpace::Destination,
        _ => DimensionSpace::Source,
    };

    ensure_plannable(config, runtime)?;

    let mut jobs = Vec::new();
    for data_item in &config.data_items {
        for period_id in &runtime.periods {
            let request = PlanRequest {
                data_item,
                period_id,
                runtime,
                override_dimensions: None,
                space,
            };
            let job = DataJob::new(config, data_item, period_id.as_str(), runtime);
            match plan(&request)? {
                PlanVerdict::Single(_) => jobs.push(PlannedJob::new(wrap(job))),
                PlanVerdict::Paginate { dimension, chunks } => {
                    jobs.extend(chunks.into_iter().map(|chunk| PlannedJob {
                        job: wrap(job.with_override(chunk)),
                        paginated_by: Some(dimension.clone()),
                    }));
                }
            }
        }
    }
    Ok(jobs)
}

/// One metadata download per data item
pub fn plan_metadata_jobs(
    config: &MigrationConfig,
    runtime: &RuntimeConfig,
) -> MigratorResult<Vec<PlannedJob>> {
    if config.data_items.is_empty() {
        return Err(MigratorError::invalid_request(format!(
            "migration config {} has no data items",
            config.id
        )));
    }
    for data_item in &config.data_items {
        crate::planner::validate_data_item(data_item)?;
    }

    Ok(config
        .data_items
        .iter()
        .map(|data_item| {
            PlannedJob::new(Job::MetadataDownload(MetadataJob {
                main_config_id: config.id.clone(),
                config: config.clone(),
                data_item: data_item.clone(),
                runtime: runtime.clone(),
            }))
        })
        .collect())
}

fn ensure_plannable(config: &MigrationConfig, runtime: &RuntimeConfig) -> MigratorResult<()> {
    if config.data_items.is_empty() {
        return Err(MigratorError::invalid_request(format!(
            "migration config {} has no data items",
            config.id
        )));
    }
    if runtime.periods.is_empty() {
        return Err(MigratorError::invalid_request("at least one period is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{InMemoryMessagingService, MessagingService};
    use crate::models::{DataItemConfig, DataItemType, ItemMapping, ConnectionConfig};
    use crate::store::InMemoryProgressStore;

    fn config_with(items: Vec<DataItemConfig>) -> MigrationConfig {
        MigrationConfig {
            id: "cfg1".into(),
            name: None,
            source: ConnectionConfig::new("https://source.example.org"),
            data_items: items,
        }
    }

    fn dx_item(mappings: usize) -> DataItemConfig {
        DataItemConfig {
            id: "item1".into(),
            item_type: DataItemType::DxValues,
            name: None,
            mapping: (0..mappings)
                .map(|i| ItemMapping::new(format!("src{i}"), format!("dst{i}")))
                .collect(),
            period_type_id: "MONTHLY".into(),
            parent_org_unit_id: "root".into(),
            org_unit_level: 3,
            attribute_id: None,
            attribute_options: vec![],
        }
    }

    async fn producer() -> (JobProducer, InMemoryMessagingService, Arc<InMemoryProgressStore>, QueueSet) {
        let broker = InMemoryMessagingService::new();
        let queues = crate::messaging::queue_names_for("cfg1").unwrap();
        for spec in queues.specs() {
            broker.ensure_queue(&spec).await.unwrap();
        }
        let progress = Arc::new(InMemoryProgressStore::new());
        let producer = JobProducer::new(
            Arc::new(MessagingProvider::from(broker.clone())),
            progress.clone(),
        );
        (producer, broker, progress, queues)
    }

    #[test]
    fn test_paginated_jobs_carry_overrides() {
        let runtime = RuntimeConfig {
            periods: vec!["202401".into()],
            paginate_by_data: true,
            ..RuntimeConfig::default()
        };
        let jobs = plan_data_jobs(&config_with(vec![dx_item(120)]), &runtime, ProcessType::DataDownload)
            .unwrap();

        assert_eq!(jobs.len(), 3);
        for planned in &jobs {
            assert_eq!(planned.paginated_by, Some(DimensionKey::Data));
            match &planned.job {
                Job::DataDownload(job) => assert!(job.override_dimensions.is_some()),
                other => panic!("unexpected job {other:?}"),
            }
        }
    }

    #[test]
    fn test_small_jobs_are_not_paginated() {
        let runtime = RuntimeConfig {
            periods: vec!["202401".into(), "202402".into()],
            ..RuntimeConfig::default()
        };
        let jobs = plan_data_jobs(&config_with(vec![dx_item(3)]), &runtime, ProcessType::DataDeletion)
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.paginated_by.is_none()));
        assert!(matches!(jobs[0].job, Job::DataDeletion(_)));
    }

    #[test]
    fn test_missing_periods_rejected() {
        let err = plan_data_jobs(
            &config_with(vec![dx_item(3)]),
            &RuntimeConfig::default(),
            ProcessType::DataDownload,
        )
        .unwrap_err();
        assert!(matches!(err, MigratorError::InvalidRequest(_)));
    }

    #[test]
    fn test_attribute_item_without_attribute_id_is_fatal() {
        let mut item = dx_item(2);
        item.item_type = DataItemType::AttributeValues;
        item.attribute_options = vec!["opt1".into()];
        let runtime = RuntimeConfig {
            periods: vec!["202401".into()],
            ..RuntimeConfig::default()
        };
        let err = plan_data_jobs(&config_with(vec![item]), &runtime, ProcessType::DataDownload)
            .unwrap_err();
        assert!(matches!(err, MigratorError::Planner(_)));
    }

    #[tokio::test]
    async fn test_enqueue_tags_messages_and_counts_expected() {
        let (producer, broker, progress, queues) = producer().await;
        let runtime = RuntimeConfig {
            periods: vec!["202401".into()],
            paginate_by_data: true,
            ..RuntimeConfig::default()
        };

        let report = producer
            .enqueue_data_download(&config_with(vec![dx_item(120)]), &runtime)
            .await
            .unwrap();

        assert_eq!(report.enqueued, 3);
        let messages = broker.messages(&queues.data_download);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].header_str(ENQUEUED_AT).is_some());
        assert_eq!(messages[0].header_str(PAGINATED_BY), Some("dx"));

        let record = progress.get("cfg1", ProcessType::DataDownload).await.unwrap();
        assert_eq!(record.expected_jobs, 3);
    }

    #[tokio::test]
    async fn test_partial_enqueue_is_reported() {
        let (producer, broker, progress, queues) = producer().await;
        let jobs: Vec<PlannedJob> = plan_metadata_jobs(
            &config_with(vec![dx_item(1)]),
            &RuntimeConfig::default(),
        )
        .unwrap();
        producer
            .enqueue(&queues, ProcessType::MetadataDownload, jobs.clone())
            .await
            .unwrap();

        broker.fail_publishes_to(&queues.metadata_download);
        let err = producer
            .enqueue(&queues, ProcessType::MetadataDownload, jobs)
            .await
            .unwrap_err();
        assert!(matches!(err, MigratorError::Messaging(_)));

        let record = progress.get("cfg1", ProcessType::MetadataDownload).await.unwrap();
        assert_eq!(record.expected_jobs, 1);
    }

    #[tokio::test]
    async fn test_enqueue_failing_mid_batch_reports_counts() {
        let (producer, broker, progress, queues) = producer().await;
        let runtime = RuntimeConfig {
            periods: vec!["202401".into(), "202402".into(), "202403".into()],
            ..RuntimeConfig::default()
        };
        let jobs = plan_data_jobs(&config_with(vec![dx_item(3)]), &runtime, ProcessType::DataDownload)
            .unwrap();
        assert_eq!(jobs.len(), 3);

        broker.fail_publishes_after(&queues.data_download, 2);
        let err = producer
            .enqueue(&queues, ProcessType::DataDownload, jobs)
            .await
            .unwrap_err();

        match err {
            MigratorError::PartialEnqueue {
                process_type,
                enqueued,
                failed,
                ..
            } => {
                assert_eq!(process_type, ProcessType::DataDownload);
                assert_eq!(enqueued, 2);
                assert_eq!(failed, 1);
            }
            other => panic!("expected a partial enqueue, got {other:?}"),
        }
        assert_eq!(broker.queue_length(&queues.data_download), 2);

        let record = progress.get("cfg1", ProcessType::DataDownload).await.unwrap();
        assert_eq!(record.expected_jobs, 2);
    }
}
