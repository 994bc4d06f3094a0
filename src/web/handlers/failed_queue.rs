//! # Failed Queue Handlers
//!
//! - `GET /failed-queue/:id` lists DLQ entries. Query parameters: `limit`,
//!   `offset`, `includeMessages`, `onlyQueues`, `queue` (origin queue name or
//!   process type).
//! - `DELETE /failed-queue/:id` purges the DLQ.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use crate::retry::{FailedQueueListing, FailedQueueQuery};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

pub async fn list_failed(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    Query(query): Query<FailedQueueQuery>,
) -> ApiResult<Json<FailedQueueListing>> {
    Ok(Json(state.retry.list_failed(&config_id, &query).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeFailedResponse {
    pub config_id: String,
    pub purged: u64,
}

pub async fn purge_failed(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> ApiResult<Json<PurgeFailedResponse>> {
    let purged = state.retry.purge_failed(&config_id).await?;
    Ok(Json(PurgeFailedResponse { config_id, purged }))
}
