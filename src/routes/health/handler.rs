use axum::extract::{Json, State};
use serde::Serialize;
use serde_json::Value;

use crate::{AppState, resilience::CircuitStats};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 预测服务可用时为 `ok`，否则为 `degraded`
    pub status: &'static str,
    pub ml_service: Value,
    pub circuits: Vec<CircuitStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub cache_backend: &'static str,
    pub rate_limit_backend: &'static str,
    pub circuits: Vec<CircuitStats>,
}

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, ml_service) = match state.gateway.health().await {
        Ok(response) => ("ok", response.data),
        Err(e) => {
            tracing::warn!(error = %e, "Prediction service health check failed");
            (
                "degraded",
                serde_json::json!({ "code": e.code(), "message": e.to_string() }),
            )
        }
    };

    Json(HealthResponse {
        status,
        ml_service,
        circuits: state.gateway.breakers().stats(),
    })
}

#[axum::debug_handler]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cache_backend: state.gateway.cache().backend_name(),
        rate_limit_backend: state.rate_limiter.backend_name(),
        circuits: state.gateway.breakers().stats(),
    })
}
