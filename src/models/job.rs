//! # Jobs
//!
//! The five fixed job shapes carried in queue message bodies. The body is the JSON
//! form of [`Job`], tagged by `type` with the process name, so a message can be
//! routed and decoded without consulting its queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::dimensions::DimensionMap;
use super::migration_config::{DataItemConfig, MigrationConfig};
use super::runtime_config::RuntimeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessType {
    MetadataDownload,
    MetadataUpload,
    DataDownload,
    DataUpload,
    DataDeletion,
}

impl ProcessType {
    pub const ALL: [ProcessType; 5] = [
        ProcessType::MetadataDownload,
        ProcessType::MetadataUpload,
        ProcessType::DataDownload,
        ProcessType::DataUpload,
        ProcessType::DataDeletion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::MetadataDownload => "metadata-download",
            ProcessType::MetadataUpload => "metadata-upload",
            ProcessType::DataDownload => "data-download",
            ProcessType::DataUpload => "data-upload",
            ProcessType::DataDeletion => "data-deletion",
        }
    }

    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            ProcessType::MetadataDownload | ProcessType::MetadataUpload
        )
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessType::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown process type: {s}"))
    }
}

/// Download or deletion of data values for one `(DataItemConfig, period)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataJob {
    pub main_config_id: String,
    /// Snapshot of the migration config at enqueue time
    pub config: MigrationConfig,
    pub period_id: String,
    pub data_item: DataItemConfig,
    pub runtime: RuntimeConfig,
    /// Set only on paginated sub-jobs; its presence stops further pagination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_dimensions: Option<DimensionMap>,
}

impl DataJob {
    pub fn new(
        config: &MigrationConfig,
        data_item: &DataItemConfig,
        period_id: impl Into<String>,
        runtime: &RuntimeConfig,
    ) -> Self {
        Self {
            main_config_id: config.id.clone(),
            config: config.clone(),
            period_id: period_id.into(),
            data_item: data_item.clone(),
            runtime: runtime.clone(),
            override_dimensions: None,
        }
    }

    pub fn with_override(&self, dimensions: DimensionMap) -> Self {
        Self {
            override_dimensions: Some(dimensions),
            ..self.clone()
        }
    }
}

/// Metadata download for one data item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataJob {
    pub main_config_id: String,
    pub config: MigrationConfig,
    pub data_item: DataItemConfig,
    pub runtime: RuntimeConfig,
}

/// Upload of a payload, inline or by artifact reference (exactly one of the two)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub main_config_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Kept as raw JSON so a malformed payload is rejected by the worker, not the decoder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_id: Option<String>,
    #[serde(rename = "timeout", default = "default_upload_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_upload_timeout_ms() -> u64 {
    super::runtime_config::DEFAULT_TIMEOUT_MS
}

impl UploadJob {
    pub fn from_artifact(main_config_id: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            main_config_id: main_config_id.into(),
            artifact: Some(artifact.into()),
            payload: None,
            data_item_id: None,
            period_id: None,
            timeout_ms: default_upload_timeout_ms(),
        }
    }

    pub fn inline(main_config_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            main_config_id: main_config_id.into(),
            artifact: None,
            payload: Some(payload),
            data_item_id: None,
            period_id: None,
            timeout_ms: default_upload_timeout_ms(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn for_item(mut self, data_item_id: impl Into<String>, period_id: Option<String>) -> Self {
        self.data_item_id = Some(data_item_id.into());
        self.period_id = period_id;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Job {
    MetadataDownload(MetadataJob),
    MetadataUpload(UploadJob),
    DataDownload(DataJob),
    DataUpload(UploadJob),
    DataDeletion(DataJob),
}

impl Job {
    pub fn process_type(&self) -> ProcessType {
        match self {
            Job::MetadataDownload(_) => ProcessType::MetadataDownload,
            Job::MetadataUpload(_) => ProcessType::MetadataUpload,
            Job::DataDownload(_) => ProcessType::DataDownload,
            Job::DataUpload(_) => ProcessType::DataUpload,
            Job::DataDeletion(_) => ProcessType::DataDeletion,
        }
    }

    pub fn main_config_id(&self) -> &str {
        match self {
            Job::MetadataDownload(job) => &job.main_config_id,
            Job::MetadataUpload(job) | Job::DataUpload(job) => &job.main_config_id,
            Job::DataDownload(job) | Job::DataDeletion(job) => &job.main_config_id,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Short human-readable label for logs
    pub fn describe(&self) -> String {
        match self {
            Job::DataDownload(job) | Job::DataDeletion(job) => format!(
                "{} {}/{}{}",
                self.process_type(),
                job.data_item.id,
                job.period_id,
                if job.override_dimensions.is_some() { " (page)" } else { "" }
            ),
            Job::MetadataDownload(job) => format!("{} {}", self.process_type(), job.data_item.id),
            Job::MetadataUpload(job) | Job::DataUpload(job) => format!(
                "{} {}",
                self.process_type(),
                job.artifact.as_deref().unwrap_or("<inline>")
            ),
        }
    }
}
