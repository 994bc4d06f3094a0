//! Shared collaborators handed to the producer, workers and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use crate::clients::ClientFactory;
use crate::config::MigratorConfig;
use crate::error::{MigratorError, MigratorResult};
use crate::messaging::MessagingProvider;
use crate::models::MigrationConfig;
use crate::store::{ArtifactStore, ConfigStore, ProgressStore};

use super::producer::JobProducer;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Rows per analytics page when fetching
    pub fetch_page_size: u32,
    /// Ceiling on any job's own timeout
    pub max_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_page_size: 1_000,
            max_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&MigratorConfig> for PipelineSettings {
    fn from(config: &MigratorConfig) -> Self {
        Self {
            fetch_page_size: config.workers.fetch_page_size,
            max_timeout: config.workers.max_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct PipelineContext {
    pub messaging: Arc<MessagingProvider>,
    pub config_store: Arc<dyn ConfigStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub clients: Arc<dyn ClientFactory>,
    pub settings: PipelineSettings,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("messaging", &self.messaging.provider_name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    pub fn producer(&self) -> JobProducer {
        JobProducer::new(self.messaging.clone(), self.progress.clone())
    }

    /// Live migration config, or `ConfigNotFound`
    pub async fn load_config(&self, config_id: &str) -> MigratorResult<MigrationConfig> {
        self.config_store
            .get(config_id)
            .await?
            .ok_or_else(|| MigratorError::config_not_found(config_id))
    }

    pub fn cap_timeout(&self, timeout: Duration) -> Duration {
        timeout.min(self.settings.max_timeout)
    }
}
