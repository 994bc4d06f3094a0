//! # Web API
//!
//! Axum HTTP control surface for the migration service.
//!
//! - [`routes`] - route groups
//! - [`handlers`] - request handlers per resource
//! - [`state`] - shared [`AppState`]
//! - [`errors`] - [`ApiError`] and its JSON error body
//! - [`extract`] - optional JSON bodies

pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Router with every route group, request timeout, CORS and HTTP tracing
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = Duration::from_millis(app_state.request_timeout_ms);

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::job_routes())
        .merge(routes::queue_routes())
        .merge(routes::retry_routes())
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
