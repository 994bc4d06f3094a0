//! # Job Request Handlers
//!
//! Entry points that plan and enqueue work for a migration config:
//!
//! - `POST /metadata-download/:id`
//! - `POST /data-download/:id`
//! - `POST /data-delete/:id`
//! - `POST /data-validation/:id` (synchronous, nothing is enqueued)
//!
//! Every body is a [`RuntimeConfig`]; an absent or empty body means defaults
//! and a malformed one is rejected with 400.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::models::{ProcessType, RuntimeConfig};
use crate::pipeline::EnqueueReport;
use crate::validation::ValidationReport;
use crate::web::errors::ApiResult;
use crate::web::extract::JsonOrDefault;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub config_id: String,
    pub process_type: ProcessType,
    pub enqueued: usize,
    pub message_ids: Vec<String>,
}

impl EnqueueResponse {
    fn new(config_id: &str, report: EnqueueReport) -> Self {
        Self {
            config_id: config_id.to_string(),
            process_type: report.process_type,
            enqueued: report.enqueued,
            message_ids: report.message_ids,
        }
    }
}

type Accepted = (StatusCode, Json<EnqueueResponse>);

/// Enqueue one metadata-download job per data item: POST /metadata-download/:id
pub async fn metadata_download(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    JsonOrDefault(runtime): JsonOrDefault<RuntimeConfig>,
) -> ApiResult<Accepted> {
    let config = state.pipeline.load_config(&config_id).await?;
    let report = state
        .producer()
        .enqueue_metadata_download(&config, &runtime)
        .await?;
    info!(config_id = %config_id, enqueued = report.enqueued, "Metadata download requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse::new(&config_id, report)),
    ))
}

/// Plan and enqueue data-download jobs: POST /data-download/:id
pub async fn data_download(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    JsonOrDefault(runtime): JsonOrDefault<RuntimeConfig>,
) -> ApiResult<Accepted> {
    let config = state.pipeline.load_config(&config_id).await?;
    let report = state
        .producer()
        .enqueue_data_download(&config, &runtime)
        .await?;
    info!(config_id = %config_id, enqueued = report.enqueued, "Data download requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse::new(&config_id, report)),
    ))
}

/// Plan and enqueue data-deletion jobs: POST /data-delete/:id
pub async fn data_delete(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    JsonOrDefault(runtime): JsonOrDefault<RuntimeConfig>,
) -> ApiResult<Accepted> {
    let config = state.pipeline.load_config(&config_id).await?;
    let report = state
        .producer()
        .enqueue_data_deletion(&config, &runtime)
        .await?;
    info!(config_id = %config_id, enqueued = report.enqueued, "Data deletion requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse::new(&config_id, report)),
    ))
}

/// Compare source and destination record counts: POST /data-validation/:id
pub async fn data_validation(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    JsonOrDefault(runtime): JsonOrDefault<RuntimeConfig>,
) -> ApiResult<Json<ValidationReport>> {
    let config = state.pipeline.load_config(&config_id).await?;
    let report = state.validator.validate(&config, &runtime).await?;
    Ok(Json(report))
}
