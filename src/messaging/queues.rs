//! # Queue Set
//!
//! Every migration config owns five durable work queues and one DLQ, named
//! deterministically from the config id:
//!
//! ```text
//! analytics-migration.{configId}.metadata-download
//! analytics-migration.{configId}.metadata-upload
//! analytics-migration.{configId}.data-download
//! analytics-migration.{configId}.data-upload
//! analytics-migration.{configId}.data-deletion
//! analytics-migration.{configId}.failed
//! ```
//!
//! [`queue_names_for`] is a pure function; [`QueueRegistry`] performs the broker
//! side of the lifecycle (create, delete, purge, stats).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use super::errors::{MessagingError, MessagingResult};
use super::provider::MessagingProvider;
use super::types::{QueueSpec, QueueStats};
use crate::models::ProcessType;

pub const QUEUE_PREFIX: &str = "analytics-migration";
pub const FAILED_QUEUE_SUFFIX: &str = "failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSet {
    pub config_id: String,
    pub metadata_download: String,
    pub metadata_upload: String,
    pub data_download: String,
    pub data_upload: String,
    pub data_deletion: String,
    pub failed: String,
}

pub fn queue_names_for(config_id: &str) -> MessagingResult<QueueSet> {
    validate_config_id(config_id)?;
    let name = |suffix: &str| format!("{QUEUE_PREFIX}.{config_id}.{suffix}");

    Ok(QueueSet {
        config_id: config_id.to_string(),
        metadata_download: name(ProcessType::MetadataDownload.as_str()),
        metadata_upload: name(ProcessType::MetadataUpload.as_str()),
        data_download: name(ProcessType::DataDownload.as_str()),
        data_upload: name(ProcessType::DataUpload.as_str()),
        data_deletion: name(ProcessType::DataDeletion.as_str()),
        failed: name(FAILED_QUEUE_SUFFIX),
    })
}

/// Config id and process type of a work queue name, if it is one
pub fn parse_work_queue(queue_name: &str) -> Option<(String, ProcessType)> {
    let rest = queue_name.strip_prefix(QUEUE_PREFIX)?.strip_prefix('.')?;
    let (config_id, suffix) = rest.rsplit_once('.')?;
    let process = suffix.parse::<ProcessType>().ok()?;
    validate_config_id(config_id).ok()?;
    Some((config_id.to_string(), process))
}

fn validate_config_id(config_id: &str) -> MessagingResult<()> {
    if config_id.is_empty() {
        return Err(MessagingError::invalid_queue_name(
            config_id,
            "config id must not be empty",
        ));
    }
    if let Some(bad) = config_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(MessagingError::invalid_queue_name(
            config_id,
            format!("config id contains unsupported character {bad:?}"),
        ));
    }
    Ok(())
}

impl QueueSet {
    pub fn for_process(&self, process: ProcessType) -> &str {
        match process {
            ProcessType::MetadataDownload => &self.metadata_download,
            ProcessType::MetadataUpload => &self.metadata_upload,
            ProcessType::DataDownload => &self.data_download,
            ProcessType::DataUpload => &self.data_upload,
            ProcessType::DataDeletion => &self.data_deletion,
        }
    }

    pub fn work_queues(&self) -> [(ProcessType, &str); 5] {
        ProcessType::ALL.map(|p| (p, self.for_process(p)))
    }

    /// Process type served by a work queue of this set
    pub fn process_for_queue(&self, queue_name: &str) -> Option<ProcessType> {
        ProcessType::ALL
            .into_iter()
            .find(|p| self.for_process(*p) == queue_name)
    }

    /// All six queue names, DLQ last
    pub fn all(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.work_queues().iter().map(|(_, q)| *q).collect();
        names.push(&self.failed);
        names
    }

    /// DLQ first so work queues can reference it as their dead-letter target
    pub fn specs(&self) -> Vec<QueueSpec> {
        std::iter::once(QueueSpec::new(&self.failed))
            .chain(
                self.work_queues()
                    .iter()
                    .map(|(_, q)| QueueSpec::new(*q).dead_lettering_to(&self.failed)),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub config_id: String,
    pub purged: BTreeMap<String, u64>,
}

impl PurgeReport {
    pub fn total(&self) -> u64 {
        self.purged.values().sum()
    }
}

/// Broker-side lifecycle of a config's queue set
#[derive(Debug, Clone)]
pub struct QueueRegistry {
    messaging: Arc<MessagingProvider>,
}

impl QueueRegistry {
    pub fn new(messaging: Arc<MessagingProvider>) -> Self {
        Self { messaging }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, config_id: &str) -> MessagingResult<QueueSet> {
        let queues = queue_names_for(config_id)?;
        for spec in queues.specs() {
            self.messaging.ensure_queue(&spec).await?;
        }
        info!(config_id = %config_id, "📬 Queue set declared");
        Ok(queues)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, config_id: &str) -> MessagingResult<QueueSet> {
        let queues = queue_names_for(config_id)?;
        // Work queues first; they dead-letter into the DLQ
        for (_, queue) in queues.work_queues() {
            self.messaging.delete_queue(queue).await?;
        }
        self.messaging.delete_queue(&queues.failed).await?;
        info!(config_id = %config_id, "🗑️ Queue set deleted");
        Ok(queues)
    }

    #[instrument(skip(self))]
    pub async fn purge(&self, config_id: &str) -> MessagingResult<PurgeReport> {
        let queues = queue_names_for(config_id)?;
        let mut purged = BTreeMap::new();
        for queue in queues.all() {
            let count = self.messaging.purge_queue(queue).await?;
            purged.insert(queue.to_string(), count);
        }
        let report = PurgeReport {
            config_id: config_id.to_string(),
            purged,
        };
        info!(config_id = %config_id, total = report.total(), "Queue set purged");
        Ok(report)
    }

    pub async fn stats(&self, config_id: &str) -> MessagingResult<Vec<QueueStats>> {
        let queues = queue_names_for(config_id)?;
        let mut stats = Vec::with_capacity(6);
        for queue in queues.all() {
            stats.push(self.messaging.queue_stats(queue).await?);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::providers::InMemoryMessagingService;
    use crate::messaging::traits::MessagingService;
    use crate::messaging::types::BrokerMessage;

    #[test]
    fn test_queue_names_are_deterministic() {
        let queues = queue_names_for("cfg_01").unwrap();
        assert_eq!(queues.data_download, "analytics-migration.cfg_01.data-download");
        assert_eq!(queues.failed, "analytics-migration.cfg_01.failed");
        assert_eq!(queues, queue_names_for("cfg_01").unwrap());
        assert_eq!(queues.all().len(), 6);
        assert_eq!(
            queues.process_for_queue("analytics-migration.cfg_01.data-upload"),
            Some(ProcessType::DataUpload)
        );
        assert_eq!(queues.process_for_queue(&queues.failed), None);
    }

    #[test]
    fn test_config_ids_with_separators_are_rejected() {
        assert!(queue_names_for("").is_err());
        assert!(queue_names_for("a.b").is_err());
        assert!(queue_names_for("a/b").is_err());
    }

    #[test]
    fn test_parse_work_queue() {
        assert_eq!(
            parse_work_queue("analytics-migration.cfg_01.data-deletion"),
            Some(("cfg_01".to_string(), ProcessType::DataDeletion))
        );
        assert_eq!(parse_work_queue("analytics-migration.cfg_01.failed"), None);
        assert_eq!(parse_work_queue("other.cfg.data-upload"), None);
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let service = InMemoryMessagingService::new();
        let registry = QueueRegistry::new(Arc::new(service.clone().into()));

        let queues = registry.create("cfg").await.unwrap();
        assert!(queues.all().iter().all(|q| service.queue_exists(q)));

        service
            .publish(&queues.data_download, &BrokerMessage::new(b"{}".to_vec()))
            .await
            .unwrap();
        let report = registry.purge("cfg").await.unwrap();
        assert_eq!(report.total(), 1);

        let stats = registry.stats("cfg").await.unwrap();
        assert!(stats.iter().all(|s| s.message_count == 0));

        registry.delete("cfg").await.unwrap();
        assert!(!service.queue_exists(&queues.failed));
    }
}
