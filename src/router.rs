use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
};

// 预测相关的路由
pub fn predict_routes() -> Router<AppState> {
    Router::new()
        .route("/predict/price", post(routes::predict::predict_price))
        .route("/predict/ram", post(routes::predict::predict_ram))
        .route("/predict/battery", post(routes::predict::predict_battery))
        .route("/predict/brand", post(routes::predict::predict_brand))
        .route("/predict/advanced", post(routes::predict::advanced_predict))
}

// 搜索相关的路由
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", get(routes::search::search_phones))
}

// 健康检查与运行状态
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/status", get(routes::health::status))
}

/// 创建主路由：业务路由挂在 `api_base_uri` 下，外层加日志和限流中间件
pub fn create_router(state: AppState) -> Router {
    let rate_limiter: Arc<RateLimiter> = state.rate_limiter.clone();
    let api = Router::new()
        .merge(predict_routes())
        .merge(search_routes())
        .merge(health_routes());

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    // 先添加的层在外层：日志包住限流，429 也会带上 request id
    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(log_errors))
                .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit)),
        )
        .with_state(state)
}
