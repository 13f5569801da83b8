use axum::extract::{Json, State};
use serde_json::Value;

use super::model::SearchQuery;
use crate::{
    AppState, error::AppError, gateway::GatewayResponse, routes::extract::AppQuery,
};

#[axum::debug_handler]
pub async fn search_phones(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Json<GatewayResponse<Value>>, AppError> {
    state.gateway.search_phones(&query.q).await.map(Json)
}
