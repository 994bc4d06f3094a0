//! # Route Definitions
//!
//! Route groups merged by [`create_app`](super::create_app). Paths mirror the
//! control surface consumed by the migration UI.

use axum::routing::{get, post};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Planning and validation entry points
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/metadata-download/:id",
            post(handlers::jobs::metadata_download),
        )
        .route("/data-download/:id", post(handlers::jobs::data_download))
        .route("/data-delete/:id", post(handlers::jobs::data_delete))
        .route("/data-validation/:id", post(handlers::jobs::data_validation))
}

/// Queue lifecycle, status and the failed queue
pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/queues/:id",
            post(handlers::queues::queue_action).delete(handlers::queues::delete_queues),
        )
        .route("/status/:id", get(handlers::status::migration_status))
        .route(
            "/failed-queue/:id",
            get(handlers::failed_queue::list_failed).delete(handlers::failed_queue::purge_failed),
        )
}

pub fn retry_routes() -> Router<AppState> {
    Router::new()
        .route("/retry/:id", post(handlers::retry::retry_bulk))
        .route(
            "/retry/:id/message/:message_id",
            post(handlers::retry::retry_message).get(handlers::retry::get_failed_message),
        )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}
