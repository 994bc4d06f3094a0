//! `GET /health`: service liveness plus broker reachability.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::web::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub broker: BrokerHealth,
    pub running_configs: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerHealth {
    pub provider: &'static str,
    pub reachable: bool,
}

/// 200 when the broker answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = match state.messaging().health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Broker health check failed");
            false
        }
    };
    let (code, status) = if reachable {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            broker: BrokerHealth {
                provider: state.messaging().provider_name(),
                reachable,
            },
            running_configs: state.consumers.running(),
            timestamp: Utc::now(),
        }),
    )
}
