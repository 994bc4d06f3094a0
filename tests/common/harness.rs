//! In-process wiring of the whole pipeline: in-memory broker and stores, a
//! temporary artifact directory and scripted analytics systems.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;

use analytics_migrator::config::{MessagingProviderKind, MigratorConfig};
use analytics_migrator::messaging::{
    queue_names_for, BrokerMessage, InMemoryMessagingService, MessagingProvider, QueueSet,
};
use analytics_migrator::models::{MigrationConfig, ProcessType};
use analytics_migrator::pipeline::{DispatchOutcome, JobDispatcher, PipelineContext, PipelineSettings};
use analytics_migrator::store::{FsArtifactStore, InMemoryConfigStore, InMemoryProgressStore};
use analytics_migrator::web::AppState;
use analytics_migrator::MigratorBootstrap;

use super::fake_api::{FakeAnalyticsApi, FakeClientFactory};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestHarness {
    pub broker: InMemoryMessagingService,
    pub ctx: PipelineContext,
    pub configs: Arc<InMemoryConfigStore>,
    pub progress: Arc<InMemoryProgressStore>,
    pub clients: FakeClientFactory,
    pub queues: QueueSet,
    pub artifacts_dir: TempDir,
}

impl TestHarness {
    /// Harness serving `config`, with its queue set declared
    pub async fn new(config: MigrationConfig) -> Self {
        let broker = InMemoryMessagingService::new();
        let messaging: Arc<MessagingProvider> = Arc::new(broker.clone().into());
        let configs = Arc::new(InMemoryConfigStore::new());
        let progress = Arc::new(InMemoryProgressStore::new());
        let clients = FakeClientFactory::new();
        let artifacts_dir = tempfile::tempdir().expect("temp dir");
        let artifacts = FsArtifactStore::new(artifacts_dir.path())
            .await
            .expect("artifact store");

        let queues = queue_names_for(&config.id).expect("valid config id");
        for spec in queues.specs() {
            messaging.ensure_queue(&spec).await.expect("declare queue");
        }
        configs.insert(config);

        let ctx = PipelineContext {
            messaging,
            config_store: configs.clone(),
            progress: progress.clone(),
            artifacts: Arc::new(artifacts),
            clients: Arc::new(clients.clone()),
            settings: PipelineSettings::default(),
        };

        Self {
            broker,
            ctx,
            configs,
            progress,
            clients,
            queues,
            artifacts_dir,
        }
    }

    pub fn source(&self) -> &Arc<FakeAnalyticsApi> {
        &self.clients.source
    }

    pub fn destination(&self) -> &Arc<FakeAnalyticsApi> {
        &self.clients.destination
    }

    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(self.ctx.clone())
    }

    pub fn service_config() -> MigratorConfig {
        let mut config = MigratorConfig::default();
        config.messaging.provider = MessagingProviderKind::InMemory;
        config.workers.consumers_per_queue = 1;
        config.workers.shutdown_grace_ms = 500;
        config
    }

    /// Web state over this harness's pipeline
    pub fn app_state(&self) -> AppState {
        MigratorBootstrap::assemble(Self::service_config(), self.ctx.clone()).state
    }

    pub fn queue_length(&self, process: ProcessType) -> usize {
        self.broker.queue_length(self.queues.for_process(process))
    }

    pub fn failed(&self) -> Vec<BrokerMessage> {
        self.broker.messages(&self.queues.failed)
    }

    pub fn artifact_count(&self) -> usize {
        std::fs::read_dir(self.artifacts_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Deliver the next message of `process` to the dispatcher
    pub async fn deliver_next(&self, process: ProcessType) -> DispatchOutcome {
        let queue = self.queues.for_process(process).to_string();
        let mut stream = self
            .ctx
            .messaging
            .subscribe(&queue, "test-consumer")
            .await
            .expect("subscribe");
        let delivery = tokio::time::timeout(DELIVERY_TIMEOUT, stream.next())
            .await
            .expect("delivery within timeout")
            .expect("stream open")
            .expect("delivery");
        self.dispatcher()
            .process(delivery)
            .await
            .expect("dispatch settles the delivery")
    }

    /// Deliver every message currently queued for `process`
    pub async fn drain(&self, process: ProcessType) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        while self.queue_length(process) > 0 {
            outcomes.push(self.deliver_next(process).await);
        }
        outcomes
    }
}
