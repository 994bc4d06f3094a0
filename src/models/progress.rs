use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::ProcessType;

/// Expected vs. completed job counters for one `(config, process type)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub config_id: String,
    pub process_type: ProcessType,
    pub expected_jobs: u64,
    pub completed_jobs: u64,
}

impl ProgressRecord {
    pub fn empty(config_id: impl Into<String>, process_type: ProcessType) -> Self {
        Self {
            config_id: config_id.into(),
            process_type,
            expected_jobs: 0,
            completed_jobs: 0,
        }
    }

    pub fn outstanding(&self) -> u64 {
        self.expected_jobs.saturating_sub(self.completed_jobs)
    }
}

/// How far a status figure can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusConfidence {
    /// Derived from progress counters; outstanding jobs are exact, but in-flight
    /// ones are reported as `queued` with `processing` at 0
    Exact,
    /// Derived from broker depth and consumer counts; `processing` is a heuristic
    Approximate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub process_type: ProcessType,
    pub queued: u64,
    pub processing: u64,
    pub failed: u64,
    pub confidence: StatusConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub config_id: String,
    pub processes: Vec<ProcessStatus>,
    /// True when the DLQ scan hit its limit and `failed` counts are lower bounds
    pub failed_truncated: bool,
    pub generated_at: DateTime<Utc>,
}

impl MigrationStatus {
    pub fn process(&self, process_type: ProcessType) -> Option<&ProcessStatus> {
        self.processes
            .iter()
            .find(|p| p.process_type == process_type)
    }
}
