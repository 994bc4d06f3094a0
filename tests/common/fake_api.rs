//! Scripted [`AnalyticsApi`] standing in for the source and destination systems.
//!
//! Responses are configured up front; every call is recorded so tests can
//! assert on what the pipeline sent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use analytics_migrator::clients::{
    AnalyticsApi, AnalyticsQuery, AnalyticsResponse, ClientError, ClientFactory, ClientResult,
    MetadataImportReport, MetadataRequest,
};
use analytics_migrator::models::{
    ConnectionConfig, DataValueSet, ImportCount, ImportStrategy, ImportSummary,
};

#[derive(Debug, Default)]
struct Script {
    analytics: Option<AnalyticsResponse>,
    analytics_error: Option<ClientError>,
    import_error: Option<ClientError>,
    import_count: Option<ImportCount>,
    combos: HashMap<String, String>,
    metadata: Option<Value>,
}

#[derive(Debug, Default)]
struct Calls {
    queries: Vec<AnalyticsQuery>,
    imports: Vec<(DataValueSet, ImportStrategy)>,
    metadata_requests: Vec<MetadataRequest>,
    metadata_imports: Vec<Value>,
}

#[derive(Debug)]
pub struct FakeAnalyticsApi {
    base_url: String,
    script: Mutex<Script>,
    calls: Mutex<Calls>,
}

impl FakeAnalyticsApi {
    pub fn new(base_url: &str) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.to_string(),
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Calls::default()),
        })
    }

    /// Every analytics query answers with these rows (single page)
    pub fn respond_with_rows(&self, rows: Vec<Vec<String>>) {
        self.script.lock().analytics = Some(AnalyticsResponse::new(&["dx", "pe", "ou", "value"], rows));
    }

    pub fn fail_analytics_with(&self, error: ClientError) {
        self.script.lock().analytics_error = Some(error);
    }

    pub fn clear_analytics_failure(&self) {
        self.script.lock().analytics_error = None;
    }

    pub fn fail_imports_with(&self, error: ClientError) {
        self.script.lock().import_error = Some(error);
    }

    pub fn clear_import_failure(&self) {
        self.script.lock().import_error = None;
    }

    pub fn set_import_count(&self, count: ImportCount) {
        self.script.lock().import_count = Some(count);
    }

    pub fn add_combo(&self, category_option: &str, combo: &str) {
        self.script
            .lock()
            .combos
            .insert(category_option.to_string(), combo.to_string());
    }

    pub fn respond_with_metadata(&self, metadata: Value) {
        self.script.lock().metadata = Some(metadata);
    }

    pub fn queries(&self) -> Vec<AnalyticsQuery> {
        self.calls.lock().queries.clone()
    }

    pub fn imports(&self) -> Vec<(DataValueSet, ImportStrategy)> {
        self.calls.lock().imports.clone()
    }

    pub fn metadata_requests(&self) -> Vec<MetadataRequest> {
        self.calls.lock().metadata_requests.clone()
    }

    pub fn metadata_imports(&self) -> Vec<Value> {
        self.calls.lock().metadata_imports.clone()
    }
}

pub fn timeout_error(url: &str) -> ClientError {
    ClientError::Timeout {
        url: url.to_string(),
        timeout_ms: 60_000,
    }
}

pub fn http_error(status: u16, url: &str, body: Value) -> ClientError {
    ClientError::Http {
        status,
        url: url.to_string(),
        body: body.to_string(),
    }
}

/// 409 body in the destination's import summary shape
pub fn conflict_body(ignored: u64) -> Value {
    json!({
        "httpStatus": "Conflict",
        "httpStatusCode": 409,
        "response": {
            "status": "WARNING",
            "importCount": {"imported": 0, "updated": 0, "ignored": ignored, "deleted": 0},
            "conflicts": [{"object": "dst0", "value": "Period is locked"}]
        }
    })
}

#[async_trait]
impl AnalyticsApi for FakeAnalyticsApi {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_analytics(
        &self,
        query: &AnalyticsQuery,
        _timeout: Duration,
    ) -> ClientResult<AnalyticsResponse> {
        self.calls.lock().queries.push(query.clone());
        let script = self.script.lock();
        if let Some(error) = &script.analytics_error {
            return Err(error.clone());
        }
        Ok(script
            .analytics
            .clone()
            .unwrap_or_else(|| AnalyticsResponse::new(&["dx", "pe", "ou", "value"], vec![])))
    }

    async fn import_data_values(
        &self,
        values: &DataValueSet,
        strategy: ImportStrategy,
        _timeout: Duration,
    ) -> ClientResult<ImportSummary> {
        self.calls.lock().imports.push((values.clone(), strategy));
        let script = self.script.lock();
        if let Some(error) = &script.import_error {
            return Err(error.clone());
        }
        let records = values.len() as u64;
        let import_count = script.import_count.unwrap_or(match strategy {
            ImportStrategy::CreateAndUpdate => ImportCount {
                imported: records,
                ..ImportCount::default()
            },
            ImportStrategy::Delete => ImportCount {
                deleted: records,
                ..ImportCount::default()
            },
        });
        Ok(ImportSummary {
            status: Some("SUCCESS".into()),
            import_count,
            ..ImportSummary::default()
        })
    }

    async fn resolve_attribute_option_combo(
        &self,
        category_option_id: &str,
        _timeout: Duration,
    ) -> ClientResult<Option<String>> {
        Ok(self.script.lock().combos.get(category_option_id).cloned())
    }

    async fn fetch_metadata(
        &self,
        request: &MetadataRequest,
        _timeout: Duration,
    ) -> ClientResult<Value> {
        self.calls.lock().metadata_requests.push(request.clone());
        Ok(self
            .script
            .lock()
            .metadata
            .clone()
            .unwrap_or_else(|| json!({"dataElements": [{"id": "dst0"}]})))
    }

    async fn import_metadata(
        &self,
        payload: &Value,
        _timeout: Duration,
    ) -> ClientResult<MetadataImportReport> {
        self.calls.lock().metadata_imports.push(payload.clone());
        if let Some(error) = &self.script.lock().import_error {
            return Err(error.clone());
        }
        Ok(MetadataImportReport {
            status: Some("OK".into()),
            ..MetadataImportReport::default()
        })
    }
}

/// Hands out the same two fakes regardless of connection details
#[derive(Debug, Clone)]
pub struct FakeClientFactory {
    pub source: Arc<FakeAnalyticsApi>,
    pub destination: Arc<FakeAnalyticsApi>,
}

impl FakeClientFactory {
    pub fn new() -> Self {
        Self {
            source: FakeAnalyticsApi::new("https://source.example.org"),
            destination: FakeAnalyticsApi::new("https://destination.example.org"),
        }
    }
}

impl ClientFactory for FakeClientFactory {
    fn source(&self, _connection: &ConnectionConfig) -> ClientResult<Arc<dyn AnalyticsApi>> {
        Ok(self.source.clone())
    }

    fn destination(&self) -> Arc<dyn AnalyticsApi> {
        self.destination.clone()
    }
}
