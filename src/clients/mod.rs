//! # Analytics API Clients
//!
//! [`AnalyticsApi`] is the seam between the pipeline and the two analytics
//! systems. Workers obtain clients through a [`ClientFactory`]: the source client
//! is built per job from the live migration config, the destination client is
//! shared and configured once for the service.

pub mod errors;
pub mod http;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{ConnectionConfig, DataValueSet, ImportStrategy, ImportSummary};

pub use errors::{ClientError, ClientResult};
pub use http::AnalyticsHttpClient;
pub use types::{
    AnalyticsHeader, AnalyticsQuery, AnalyticsResponse, MetadataImportReport, MetadataImportStats,
    MetadataRequest, Pager,
};

#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    fn base_url(&self) -> &str;

    /// One page of analytics rows for the given dimensions
    async fn fetch_analytics(
        &self,
        query: &AnalyticsQuery,
        timeout: Duration,
    ) -> ClientResult<AnalyticsResponse>;

    /// Synchronous `dataValueSets` import; a 409 surfaces as `ClientError::Http`
    async fn import_data_values(
        &self,
        values: &DataValueSet,
        strategy: ImportStrategy,
        timeout: Duration,
    ) -> ClientResult<ImportSummary>;

    /// Category option combo id for a single attribute category option
    async fn resolve_attribute_option_combo(
        &self,
        category_option_id: &str,
        timeout: Duration,
    ) -> ClientResult<Option<String>>;

    async fn fetch_metadata(
        &self,
        request: &MetadataRequest,
        timeout: Duration,
    ) -> ClientResult<serde_json::Value>;

    async fn import_metadata(
        &self,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> ClientResult<MetadataImportReport>;
}

pub trait ClientFactory: Send + Sync {
    fn source(&self, connection: &ConnectionConfig) -> ClientResult<Arc<dyn AnalyticsApi>>;

    fn destination(&self) -> Arc<dyn AnalyticsApi>;
}

/// Builds reqwest-backed clients sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
    destination: Arc<AnalyticsHttpClient>,
}

impl HttpClientFactory {
    pub fn new(destination: ConnectionConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("analytics-migrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        let destination = Arc::new(AnalyticsHttpClient::new(http.clone(), destination)?);
        Ok(Self { http, destination })
    }
}

impl ClientFactory for HttpClientFactory {
    fn source(&self, connection: &ConnectionConfig) -> ClientResult<Arc<dyn AnalyticsApi>> {
        Ok(Arc::new(AnalyticsHttpClient::new(
            self.http.clone(),
            connection.clone(),
        )?))
    }

    fn destination(&self) -> Arc<dyn AnalyticsApi> {
        self.destination.clone()
    }
}
