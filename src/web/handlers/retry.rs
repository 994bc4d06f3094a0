//! # Retry Handlers
//!
//! - `POST /retry/:id` with `{maxRetries?, processType?}` moves up to
//!   `maxRetries` retryable DLQ entries back to their origin queues.
//! - `POST /retry/:id/message/:message_id` retries one entry, fatal or not.
//! - `GET /retry/:id/message/:message_id` reads one entry without touching it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::models::ProcessType;
use crate::retry::{FailedMessage, RetrySummary, SingleRetryOutcome};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extract::JsonOrDefault;
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub process_type: Option<ProcessType>,
}

pub async fn retry_bulk(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    JsonOrDefault(request): JsonOrDefault<RetryRequest>,
) -> ApiResult<Json<RetrySummary>> {
    let max_retries = request.max_retries.unwrap_or(state.default_max_retries);
    if max_retries == 0 {
        return Err(ApiError::bad_request("maxRetries must be greater than zero"));
    }
    let summary = state
        .retry
        .retry_bulk(&config_id, max_retries, request.process_type)
        .await?;
    Ok(Json(summary))
}

/// 200 when retried, 404 when the id is not in the DLQ, 409 when the message
/// could not be republished and is back in the DLQ
pub async fn retry_message(
    State(state): State<AppState>,
    Path((config_id, message_id)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<SingleRetryOutcome>)> {
    let outcome = state
        .retry
        .retry_single_message(&config_id, &message_id)
        .await?;
    let status = match &outcome {
        SingleRetryOutcome::Retried { .. } => StatusCode::OK,
        SingleRetryOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
        SingleRetryOutcome::Failed { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)))
}

pub async fn get_failed_message(
    State(state): State<AppState>,
    Path((config_id, message_id)): Path<(String, String)>,
) -> ApiResult<Json<FailedMessage>> {
    state
        .retry
        .find_message(&config_id, &message_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Message {message_id} not found in failed queue")))
}
