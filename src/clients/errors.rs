use thiserror::Error;

use crate::models::ImportSummary;

/// Errors from calls to a source or destination analytics system
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String, body: String },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    pub fn from_reqwest(url: &str, timeout_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout_ms,
            }
        } else if err.is_decode() {
            Self::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Import summary carried in an HTTP error body, if any
    pub fn import_summary(&self) -> Option<ImportSummary> {
        match self {
            Self::Http { body, .. } => ImportSummary::from_response_text(body),
            _ => None,
        }
    }

    /// Whether a later retry could plausibly succeed.
    ///
    /// Timeouts, transport failures, 5xx and 429 are transient; other 4xx responses
    /// mean the request itself is wrong.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::Decode { .. } | Self::Configuration(_) => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let http = |status| ClientError::Http {
            status,
            url: "u".into(),
            body: String::new(),
        };
        assert!(http(503).is_transient());
        assert!(http(429).is_transient());
        assert!(!http(400).is_transient());
        assert!(!http(409).is_transient());
        assert!(ClientError::Timeout {
            url: "u".into(),
            timeout_ms: 10
        }
        .is_transient());
    }

    #[test]
    fn test_conflict_body_yields_summary() {
        let err = ClientError::Http {
            status: 409,
            url: "u".into(),
            body: r#"{"response":{"importCount":{"imported":0,"updated":0,"ignored":5,"deleted":0}}}"#.into(),
        };
        assert!(err.is_conflict());
        assert_eq!(err.import_summary().unwrap().import_count.ignored, 5);
    }
}
