//! # Configuration Store
//!
//! Read-only access to migration configs. In production the configs live in the
//! destination system's datastore (`/api/dataStore/{namespace}/{id}`), written by
//! the configuration UI; the pipeline only ever reads them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::errors::{StoreError, StoreResult};
use crate::models::{ConnectionConfig, Credentials, MigrationConfig};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// `Ok(None)` when no config exists under that id
    async fn get(&self, config_id: &str) -> StoreResult<Option<MigrationConfig>>;
}

/// Configs held in process; used by tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<HashMap<String, MigrationConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config: MigrationConfig) {
        self.configs.write().insert(config.id.clone(), config);
    }

    pub fn remove(&self, config_id: &str) -> Option<MigrationConfig> {
        self.configs.write().remove(config_id)
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, config_id: &str) -> StoreResult<Option<MigrationConfig>> {
        Ok(self.configs.read().get(config_id).cloned())
    }
}

/// Configs read from the destination datastore over HTTP
#[derive(Debug, Clone)]
pub struct DataStoreConfigStore {
    http: reqwest::Client,
    connection: ConnectionConfig,
    namespace: String,
    timeout: Duration,
}

impl DataStoreConfigStore {
    pub fn new(
        http: reqwest::Client,
        connection: ConnectionConfig,
        namespace: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            connection,
            namespace: namespace.into(),
            timeout,
        }
    }

    fn url(&self, config_id: &str) -> String {
        format!(
            "{}/api/dataStore/{}/{}",
            self.connection.base(),
            self.namespace,
            config_id
        )
    }
}

#[async_trait]
impl ConfigStore for DataStoreConfigStore {
    async fn get(&self, config_id: &str) -> StoreResult<Option<MigrationConfig>> {
        let url = self.url(config_id);
        let builder = self.http.get(&url).timeout(self.timeout);
        let builder = match self.connection.credentials() {
            Credentials::Token(token) => {
                builder.header(reqwest::header::AUTHORIZATION, format!("ApiToken {token}"))
            }
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Anonymous => builder,
        };

        let response = builder.send().await.map_err(|e| StoreError::Unavailable {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(config_id = %config_id, "Migration config not found in datastore");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| StoreError::Unavailable {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let mut config: MigrationConfig = serde_json::from_slice(&bytes)?;
        if config.id.is_empty() {
            config.id = config_id.to_string();
        }
        Ok(Some(config))
    }
}
