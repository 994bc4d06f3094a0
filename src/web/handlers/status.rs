//! `GET /status/:id`: per process type `{queued, processing, failed}`.

use axum::extract::{Path, State};
use axum::Json;

use crate::models::MigrationStatus;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

pub async fn migration_status(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
) -> ApiResult<Json<MigrationStatus>> {
    Ok(Json(state.status.status(&config_id).await?))
}
