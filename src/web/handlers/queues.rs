//! Queue lifecycle: `POST /queues/:id` with an action, `DELETE /queues/:id`.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::messaging::{queue_names_for, PurgeReport, QueueSet};
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    /// Declare the queue set, reset progress and start the worker pool
    Initialize,
    /// Declare the queue set only
    Create,
    /// Empty every queue of the set and reset progress
    Purge,
}

#[derive(Debug, Deserialize)]
pub struct QueueActionRequest {
    pub action: QueueAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueActionResponse {
    pub config_id: String,
    pub action: QueueAction,
    pub queues: Vec<String>,
    /// Whether a worker pool is serving the config after the action
    pub consumers_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purged: Option<PurgeReport>,
}

fn queue_names(queues: &QueueSet) -> Vec<String> {
    queues.all().into_iter().map(str::to_string).collect()
}

/// POST /queues/:id
pub async fn queue_action(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    Json(request): Json<QueueActionRequest>,
) -> ApiResult<Json<QueueActionResponse>> {
    let mut purged = None;
    let queues = match request.action {
        QueueAction::Create => state.queues.create(&config_id).await?,
        QueueAction::Initialize => {
            let queues = state.queues.create(&config_id).await?;
            state.progress().reset(&config_id).await?;
            let started = state.consumers.start(&config_id)?;
            info!(config_id = %config_id, started, "Queue set initialized");
            queues
        }
        QueueAction::Purge => {
            let report = state.queues.purge(&config_id).await?;
            state.progress().reset(&config_id).await?;
            let queues = queue_names_for(&config_id)?;
            purged = Some(report);
            queues
        }
    };

    Ok(Json(QueueActionResponse {
        consumers_running: state.consumers.is_running(&config_id),
        config_id,
        action: request.action,
        queues: queue_names(&queues),
        purged,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDeleteResponse {
    pub config_id: String,
    pub deleted: Vec<String>,
    pub consumers_stopped: bool,
}

/// Stop the worker pool, then delete the queue set: DELETE /queues/:id
pub async fn delete_queues(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> ApiResult<Json<QueueDeleteResponse>> {
    let consumers_stopped = state.consumers.stop(&config_id).await;
    let queues = state.queues.delete(&config_id).await?;
    if let Err(e) = state.progress().reset(&config_id).await {
        warn!(config_id = %config_id, error = %e, "Failed to reset progress after queue deletion");
    }
    Ok(Json(QueueDeleteResponse {
        config_id,
        deleted: queue_names(&queues),
        consumers_stopped,
    }))
}
