use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use gateway_backend::{
    AppState,
    cache::{
        Cache,
        operations::{CacheStore, RateLimitStore, RedisStore},
    },
    clients::{PredictionClient, SearchClient, http_client, prediction::ML_SERVICE, search::SEARCH_SERVICE},
    config::Config,
    gateway::Gateway,
    middleware::RateLimiter,
    resilience::{CircuitBreakerConfig, CircuitBreakerRegistry},
    router::create_router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志，未设置 RUST_LOG 时只输出本服务的 info 日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_backend=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 探测 Redis，不可用时缓存和限流都使用进程内存储
    let redis = match config.redis_url.as_deref() {
        Some(url) => RedisStore::connect(url).await,
        None => {
            tracing::info!("REDIS_URL not set, using in-process cache and rate limiter");
            None
        }
    };
    let cache_store = redis.clone().map(|s| Arc::new(s) as Arc<dyn CacheStore>);
    let limit_store = redis.map(|s| Arc::new(s) as Arc<dyn RateLimitStore>);

    let cache = Arc::new(Cache::new(cache_store));
    let rate_limiter = Arc::new(RateLimiter::from_config(limit_store, &config));
    let _cleanup = rate_limiter.start_cleanup();

    // 每个依赖一个熔断器
    let breakers = Arc::new(
        CircuitBreakerRegistry::new(CircuitBreakerConfig::default())
            .with_breaker(ML_SERVICE, config.ml_breaker())
            .with_breaker(SEARCH_SERVICE, config.search_breaker()),
    );

    let http = http_client().expect("Failed to create HTTP client");
    let gateway = Arc::new(Gateway::new(
        cache,
        breakers,
        PredictionClient::new(http.clone(), config.ml_service_url.clone()),
        SearchClient::new(http, config.search_service_url.clone()),
    ));

    let state = AppState {
        config: config.clone(),
        gateway,
        rate_limiter,
    };

    let router = create_router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!(%addr, api = %config.api_base_uri, "Gateway listening");
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind listener"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
