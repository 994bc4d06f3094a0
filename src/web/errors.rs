//! # Web API Errors
//!
//! Maps crate errors onto HTTP statuses with a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::MigratorError;
use crate::messaging::MessagingError;
use crate::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Broker unavailable: {message}")]
    BrokerUnavailable { message: String },

    #[error("Upstream system error: {message}")]
    Upstream { message: String },

    #[error("{message}")]
    PartialEnqueue { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::BrokerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::PartialEnqueue { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::BrokerUnavailable { .. } => "BROKER_UNAVAILABLE",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::PartialEnqueue { .. } => "PARTIAL_ENQUEUE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::BrokerUnavailable { message } => Self::BrokerUnavailable { message },
            MessagingError::QueueNotFound { .. } => Self::not_found(err.to_string()),
            MessagingError::InvalidQueueName { .. } => Self::bad_request(err.to_string()),
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        MigratorError::from(err).into()
    }
}

impl From<MigratorError> for ApiError {
    fn from(err: MigratorError) -> Self {
        match err {
            MigratorError::ConfigNotFound { .. } => Self::not_found(err.to_string()),
            MigratorError::InvalidRequest(message) => Self::BadRequest { message },
            MigratorError::Planner(e) => Self::bad_request(e.to_string()),
            MigratorError::Messaging(e) => e.into(),
            MigratorError::Client(e) => Self::Upstream {
                message: e.to_string(),
            },
            MigratorError::Store(e @ (StoreError::Http { .. } | StoreError::Unavailable { .. })) => {
                Self::Upstream {
                    message: e.to_string(),
                }
            }
            MigratorError::PartialEnqueue { .. } => Self::PartialEnqueue {
                message: err.to_string(),
            },
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
