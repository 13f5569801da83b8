//! 集成测试共用工具

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use gateway_backend::{
    AppState,
    cache::Cache,
    clients::{PredictionClient, SearchClient, http_client},
    config::Config,
    gateway::Gateway,
    middleware::RateLimiter,
    resilience::{CircuitBreakerConfig, CircuitBreakerRegistry},
};

/// 不会有服务监听的地址
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

/// 在随机端口上启动模拟的依赖服务，返回其基础 URL
#[allow(dead_code)]
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn gateway(ml_url: &str, search_url: &str, failure_threshold: u32) -> Gateway {
    let breaker = CircuitBreakerConfig {
        failure_threshold,
        ..Default::default()
    };
    let breakers = CircuitBreakerRegistry::new(breaker.clone())
        .with_breaker("ml-service", breaker.clone())
        .with_breaker("search-service", breaker);
    let http = http_client().unwrap();

    Gateway::new(
        Arc::new(Cache::in_memory()),
        Arc::new(breakers),
        PredictionClient::new(http.clone(), ml_url),
        SearchClient::new(http, search_url),
    )
    .with_retry_base_delay(Duration::from_millis(10))
}

#[allow(dead_code)]
pub fn app_state(gateway: Gateway, max_requests: u32) -> AppState {
    let config = Config::default();
    AppState {
        rate_limiter: Arc::new(RateLimiter::new(
            None,
            max_requests,
            config.rate_limit_window(),
        )),
        gateway: Arc::new(gateway),
        config,
    }
}
