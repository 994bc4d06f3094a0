//! # System Bootstrap
//!
//! Builds every collaborator from a [`MigratorConfig`]: broker provider, stores,
//! API clients, the pipeline context and the web [`AppState`]. The binary and
//! the integration tests share [`MigratorBootstrap::assemble`], so both wire the
//! services the same way.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing::{info, warn};

use crate::clients::{ClientFactory, HttpClientFactory};
use crate::config::{MessagingProviderKind, MigratorConfig, ProgressBackend};
use crate::error::{MigratorError, MigratorResult};
use crate::messaging::{
    InMemoryMessagingService, MessagingProvider, QueueRegistry, RabbitMqMessagingService,
};
use crate::pipeline::{ConsumerRegistry, JobDispatcher, PipelineContext, PipelineSettings};
use crate::retry::RetryService;
use crate::status::StatusAggregator;
use crate::store::{
    ArtifactStore, ConfigStore, DataStoreConfigStore, FsArtifactStore, InMemoryProgressStore,
    PgProgressStore, ProgressStore,
};
use crate::validation::DataValidator;
use crate::web::{self, AppState};

/// Config-store lookups are single small documents
const CONFIG_STORE_TIMEOUT: Duration = Duration::from_secs(15);

/// Running system: shared state plus lifecycle hooks
#[derive(Debug)]
pub struct MigratorSystemHandle {
    pub state: AppState,
    pub config: Arc<MigratorConfig>,
}

impl MigratorSystemHandle {
    pub fn app(&self) -> Router {
        web::create_app(self.state.clone())
    }

    /// Declare queues and start consumers for `workers.autostart_configs`.
    /// A config that fails to start is logged and skipped.
    pub async fn start_autostart_consumers(&self) -> Vec<String> {
        let mut started = Vec::new();
        for config_id in &self.config.workers.autostart_configs {
            match self.start_consumers(config_id).await {
                Ok(()) => started.push(config_id.clone()),
                Err(e) => warn!(config_id = %config_id, error = %e, "Autostart failed"),
            }
        }
        started
    }

    async fn start_consumers(&self, config_id: &str) -> MigratorResult<()> {
        self.state.queues.create(config_id).await?;
        self.state.consumers.start(config_id)?;
        Ok(())
    }

    /// Stop every worker pool, waiting up to the configured grace period each
    pub async fn stop(&self) {
        let running = self.state.consumers.running();
        self.state.consumers.stop_all().await;
        info!(stopped = running.len(), "Migration service stopped");
    }
}

#[derive(Debug)]
pub struct MigratorBootstrap;

impl MigratorBootstrap {
    /// Connect to the broker, the stores and the destination system
    pub async fn bootstrap(config: MigratorConfig) -> MigratorResult<MigratorSystemHandle> {
        info!(
            provider = ?config.messaging.provider,
            progress_backend = ?config.store.progress_backend,
            "🚀 Bootstrapping analytics migrator"
        );

        let messaging: Arc<MessagingProvider> = Arc::new(match config.messaging.provider {
            MessagingProviderKind::Rabbitmq => {
                RabbitMqMessagingService::connect(&config.rabbitmq).await?.into()
            }
            MessagingProviderKind::InMemory => {
                warn!("In-memory broker selected; queued jobs do not survive a restart");
                InMemoryMessagingService::new().into()
            }
        });

        let progress: Arc<dyn ProgressStore> = match config.store.progress_backend {
            ProgressBackend::Memory => Arc::new(InMemoryProgressStore::new()),
            ProgressBackend::Postgres => {
                let url = config.store.database_url.as_deref().ok_or_else(|| {
                    MigratorError::Configuration("store.database_url is not set".into())
                })?;
                Arc::new(PgProgressStore::connect(url, config.store.max_connections).await?)
            }
        };

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| MigratorError::Configuration(format!("HTTP client: {e}")))?;
        let config_store: Arc<dyn ConfigStore> = Arc::new(DataStoreConfigStore::new(
            http,
            config.destination.connection(),
            config.store.datastore_namespace.clone(),
            CONFIG_STORE_TIMEOUT,
        ));

        let artifacts: Arc<dyn ArtifactStore> =
            Arc::new(FsArtifactStore::new(&config.artifacts.directory).await?);
        let clients: Arc<dyn ClientFactory> =
            Arc::new(HttpClientFactory::new(config.destination.connection())?);

        let pipeline = PipelineContext {
            messaging,
            config_store,
            progress,
            artifacts,
            clients,
            settings: PipelineSettings::from(&config),
        };

        Ok(Self::assemble(config, pipeline))
    }

    /// Build the web state and worker registry around an existing pipeline context
    pub fn assemble(config: MigratorConfig, pipeline: PipelineContext) -> MigratorSystemHandle {
        let messaging = pipeline.messaging.clone();
        let retry = RetryService::new(
            messaging.clone(),
            config.retry.scan_window,
            config.retry.status_scan_limit,
        );
        let status = StatusAggregator::new(
            messaging.clone(),
            pipeline.progress.clone(),
            retry.clone(),
            config.retry.status_scan_limit,
        );
        let validator = DataValidator::new(pipeline.clients.clone(), config.workers.max_timeout());
        let consumers = ConsumerRegistry::new(
            JobDispatcher::new(pipeline.clone()),
            config.workers.consumers_per_queue,
            config.workers.shutdown_grace(),
        );

        let state = AppState {
            queues: Arc::new(QueueRegistry::new(messaging)),
            consumers: Arc::new(consumers),
            retry,
            status: Arc::new(status),
            validator: Arc::new(validator),
            default_max_retries: config.retry.default_max_retries,
            request_timeout_ms: config.web.request_timeout_ms,
            pipeline,
        };

        MigratorSystemHandle {
            state,
            config: Arc::new(config),
        }
    }
}
