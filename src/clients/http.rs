//! reqwest implementation of [`AnalyticsApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::errors::{ClientError, ClientResult};
use super::types::{AnalyticsQuery, AnalyticsResponse, MetadataImportReport, MetadataRequest};
use super::AnalyticsApi;
use crate::models::{ConnectionConfig, Credentials, DataValueSet, ImportStrategy, ImportSummary};

#[derive(Debug, Clone)]
pub struct AnalyticsHttpClient {
    http: reqwest::Client,
    connection: ConnectionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryOptionCombos {
    #[serde(default)]
    category_option_combos: Vec<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

impl AnalyticsHttpClient {
    pub fn new(http: reqwest::Client, connection: ConnectionConfig) -> ClientResult<Self> {
        let base = connection.base();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::Configuration(format!(
                "base URL must be http(s): {base:?}"
            )));
        }
        Ok(Self { http, connection })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.connection.base(), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.connection.credentials() {
            Credentials::Token(token) => {
                builder.header(reqwest::header::AUTHORIZATION, format!("ApiToken {token}"))
            }
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Anonymous => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str, timeout: Duration) -> ClientResult<Response> {
        let url = self.url(path);
        let timeout_ms = timeout.as_millis() as u64;
        let response = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, timeout_ms, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        Err(ClientError::Http {
            status: status.as_u16(),
            url,
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
        timeout: Duration,
    ) -> ClientResult<T> {
        let url = self.url(path);
        let timeout_ms = timeout.as_millis() as u64;
        let bytes = self
            .send(builder, path, timeout)
            .await?
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, timeout_ms, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl AnalyticsApi for AnalyticsHttpClient {
    fn base_url(&self) -> &str {
        self.connection.base()
    }

    #[instrument(skip(self, query), fields(base = %self.connection.base(), page = query.page))]
    async fn fetch_analytics(
        &self,
        query: &AnalyticsQuery,
        timeout: Duration,
    ) -> ClientResult<AnalyticsResponse> {
        let path = "/api/analytics";
        let builder = self.request(Method::GET, path).query(&query.query_pairs());
        let response: AnalyticsResponse = self.send_json(builder, path, timeout).await?;
        debug!(rows = response.rows.len(), page_count = response.page_count(), "Fetched analytics page");
        Ok(response)
    }

    #[instrument(skip(self, values), fields(base = %self.connection.base(), records = values.len(), strategy = strategy.as_str()))]
    async fn import_data_values(
        &self,
        values: &DataValueSet,
        strategy: ImportStrategy,
        timeout: Duration,
    ) -> ClientResult<ImportSummary> {
        let path = "/api/dataValueSets";
        let builder = self
            .request(Method::POST, path)
            .query(&[("importStrategy", strategy.as_str()), ("async", "false")])
            .json(values);
        let body: serde_json::Value = self.send_json(builder, path, timeout).await?;
        Ok(ImportSummary::from_response(&body).unwrap_or_default())
    }

    async fn resolve_attribute_option_combo(
        &self,
        category_option_id: &str,
        timeout: Duration,
    ) -> ClientResult<Option<String>> {
        let path = "/api/categoryOptionCombos.json";
        let filter = format!("categoryOptions.id:eq:{category_option_id}");
        let builder = self.request(Method::GET, path).query(&[
            ("filter", filter.as_str()),
            ("fields", "id"),
            ("paging", "false"),
        ]);
        let combos: CategoryOptionCombos = self.send_json(builder, path, timeout).await?;
        Ok(combos.category_option_combos.into_iter().next().map(|c| c.id))
    }

    async fn fetch_metadata(
        &self,
        request: &MetadataRequest,
        timeout: Duration,
    ) -> ClientResult<serde_json::Value> {
        let path = "/api/metadata.json";
        let builder = self.request(Method::GET, path).query(&request.query_pairs());
        self.send_json(builder, path, timeout).await
    }

    async fn import_metadata(
        &self,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> ClientResult<MetadataImportReport> {
        let path = "/api/metadata";
        let builder = self
            .request(Method::POST, path)
            .query(&[("importStrategy", "CREATE_AND_UPDATE"), ("atomicMode", "NONE")])
            .json(payload);
        let body: serde_json::Value = self.send_json(builder, path, timeout).await?;
        Ok(MetadataImportReport::from_response(&body).unwrap_or_default())
    }
}
