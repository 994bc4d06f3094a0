//! # Job Outcomes
//!
//! Workers return `Result<JobDone, JobFailure>`. They never ack, nack or retry;
//! the dispatcher turns the result into broker actions. A [`JobFailure`] carries
//! everything the DLQ entry needs: its kind, a reason category, a message and,
//! for HTTP failures, the status, URL and response body of the failing call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clients::{ClientError, MetadataImportReport};
use crate::error::MigratorError;
use crate::messaging::headers::{self, truncate_header_value, MAX_ERROR_BODY_BYTES};
use crate::messaging::{MessageHeaders, MessagingError};
use crate::models::{DimensionKey, ImportSummary};
use crate::planner::PlannerError;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum JobDone {
    /// Job split into paginated sub-jobs instead of fetching
    FannedOut { sub_jobs: usize, dimension: DimensionKey },
    /// Nothing to move; no artifact, no downstream job
    Empty,
    UploadEnqueued { artifact: String, records: usize },
    Imported { summary: ImportSummary },
    /// Destination answered 409; records it already had were skipped
    PartialSuccess { summary: Option<ImportSummary> },
    MetadataImported { report: MetadataImportReport },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Configuration or payload problem; retrying the same message cannot help
    Fatal,
    /// Transient I/O problem; eligible for bulk retry
    Retryable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Fatal => "fatal",
            FailureKind::Retryable => "retryable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fatal" => Ok(FailureKind::Fatal),
            "retryable" => Ok(FailureKind::Retryable),
            other => Err(format!("unknown failure kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDiagnostics {
    pub status: u16,
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    /// Short category recorded as the death reason (`timeout`, `http-error`, ...)
    pub reason: &'static str,
    pub message: String,
    pub http: Option<HttpDiagnostics>,
}

pub type JobResult = Result<JobDone, JobFailure>;

impl JobFailure {
    pub fn fatal(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            reason,
            message: message.into(),
            http: None,
        }
    }

    pub fn retryable(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            reason,
            message: message.into(),
            http: None,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::fatal("configuration-error", message)
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::fatal("invalid-payload", message)
    }

    pub fn from_client(err: &ClientError) -> Self {
        // Rejected credentials are retryable: the next attempt re-reads the live config
        let retryable = err.is_transient() || matches!(err.status(), Some(401 | 403));
        let reason = match err {
            ClientError::Timeout { .. } => "timeout",
            ClientError::Transport { .. } => "transport-error",
            ClientError::Http { .. } => "http-error",
            ClientError::Decode { .. } => "invalid-response",
            ClientError::Configuration(_) => "configuration-error",
        };
        let http = match err {
            ClientError::Http { status, url, body } => Some(HttpDiagnostics {
                status: *status,
                url: url.clone(),
                body: body.clone(),
            }),
            _ => None,
        };

        Self {
            kind: if retryable {
                FailureKind::Retryable
            } else {
                FailureKind::Fatal
            },
            reason,
            message: err.to_string(),
            http,
        }
    }

    pub fn from_store(err: &StoreError) -> Self {
        if err.is_permanent() {
            Self::fatal("storage-error", err.to_string())
        } else {
            Self::retryable("storage-error", err.to_string())
        }
    }

    pub fn from_messaging(err: &MessagingError) -> Self {
        Self::retryable("broker-error", err.to_string())
    }

    pub fn from_planner(err: &PlannerError) -> Self {
        Self::configuration(err.to_string())
    }

    pub fn from_error(err: &MigratorError) -> Self {
        match err {
            MigratorError::Messaging(e) => Self::from_messaging(e),
            MigratorError::Client(e) => Self::from_client(e),
            MigratorError::Store(e) => Self::from_store(e),
            MigratorError::Planner(e) => Self::from_planner(e),
            MigratorError::ConfigNotFound { .. }
            | MigratorError::Configuration(_)
            | MigratorError::InvalidRequest(_) => Self::configuration(err.to_string()),
            MigratorError::PartialEnqueue { .. } => Self::retryable("broker-error", err.to_string()),
            MigratorError::WorkerPool(_) | MigratorError::Internal(_) => {
                Self::retryable("internal-error", err.to_string())
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }

    /// Diagnostic headers for the DLQ copy of the failed message
    pub fn annotate(&self, message_headers: &mut MessageHeaders) {
        message_headers.insert(headers::ERROR_MESSAGE.into(), self.message.clone().into());
        message_headers.insert(headers::DEATH_REASON.into(), self.reason.into());
        message_headers.insert(headers::FAILURE_KIND.into(), self.kind.as_str().into());
        if let Some(http) = &self.http {
            message_headers.insert(headers::HTTP_STATUS.into(), http.status.into());
            message_headers.insert(headers::HTTP_URL.into(), http.url.clone().into());
            message_headers.insert(
                headers::ERROR_BODY.into(),
                truncate_header_value(&http.body, MAX_ERROR_BODY_BYTES).into(),
            );
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.reason, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable_without_http_headers() {
        let failure = JobFailure::from_client(&ClientError::Timeout {
            url: "https://src/api/analytics".into(),
            timeout_ms: 100,
        });
        assert!(failure.is_retryable());
        assert_eq!(failure.reason, "timeout");

        let mut headers = MessageHeaders::new();
        failure.annotate(&mut headers);
        assert!(headers.contains_key(headers::ERROR_MESSAGE));
        assert!(!headers.contains_key(headers::HTTP_STATUS));
    }

    #[test]
    fn test_http_failure_records_status_url_and_body() {
        let failure = JobFailure::from_client(&ClientError::Http {
            status: 500,
            url: "https://dst/api/dataValueSets".into(),
            body: "x".repeat(MAX_ERROR_BODY_BYTES + 10),
        });
        let mut headers = MessageHeaders::new();
        failure.annotate(&mut headers);

        assert_eq!(headers[headers::HTTP_STATUS], serde_json::json!(500));
        assert_eq!(headers[headers::HTTP_URL], "https://dst/api/dataValueSets");
        assert_eq!(
            headers[headers::ERROR_BODY].as_str().unwrap().len(),
            MAX_ERROR_BODY_BYTES
        );
        assert_eq!(headers[headers::FAILURE_KIND], "retryable");
    }

    #[test]
    fn test_bad_request_is_fatal_but_auth_is_retryable() {
        let http = |status| ClientError::Http {
            status,
            url: "u".into(),
            body: String::new(),
        };
        assert_eq!(JobFailure::from_client(&http(400)).kind, FailureKind::Fatal);
        assert_eq!(JobFailure::from_client(&http(401)).kind, FailureKind::Retryable);
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let failure = JobFailure::from_store(&StoreError::ArtifactNotFound { name: "a".into() });
        assert_eq!(failure.kind, FailureKind::Fatal);
    }
}
