use axum::extract::{Json, State};
use serde_json::Value;

use super::model::PredictionResponse;
use crate::{AppState, error::AppError, routes::extract::AppJson};

#[axum::debug_handler]
pub async fn predict_price(
    State(state): State<AppState>,
    AppJson(features): AppJson<Value>,
) -> Result<Json<PredictionResponse>, AppError> {
    state.gateway.predict_price(features).await.map(Json)
}

#[axum::debug_handler]
pub async fn predict_ram(
    State(state): State<AppState>,
    AppJson(features): AppJson<Value>,
) -> Result<Json<PredictionResponse>, AppError> {
    state.gateway.predict_ram(features).await.map(Json)
}

#[axum::debug_handler]
pub async fn predict_battery(
    State(state): State<AppState>,
    AppJson(features): AppJson<Value>,
) -> Result<Json<PredictionResponse>, AppError> {
    state.gateway.predict_battery(features).await.map(Json)
}

#[axum::debug_handler]
pub async fn predict_brand(
    State(state): State<AppState>,
    AppJson(features): AppJson<Value>,
) -> Result<Json<PredictionResponse>, AppError> {
    state.gateway.predict_brand(features).await.map(Json)
}

#[axum::debug_handler]
pub async fn advanced_predict(
    State(state): State<AppState>,
    AppJson(features): AppJson<Value>,
) -> Result<Json<PredictionResponse>, AppError> {
    state.gateway.advanced_predict(features).await.map(Json)
}
