use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::{
    cache::{
        keys,
        models::RateLimitStatus,
        operations::{
            MemoryRateLimitStore, RateLimitStore, StoreError, rate_limit::CLEANUP_INTERVAL,
        },
    },
    config::Config,
    error::AppError,
    utils::client_ip,
};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// 固定窗口限流器
///
/// 与缓存相同，优先使用 Redis，出错后降级为进程内计数。两套计数互不相通，
/// 切换时调用方的计数会被重置；限流只是保护性措施，不作为安全边界。
pub struct RateLimiter {
    primary: Option<Arc<dyn RateLimitStore>>,
    fallback: MemoryRateLimitStore,
    degraded: AtomicBool,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(primary: Option<Arc<dyn RateLimitStore>>, max_requests: u32, window: Duration) -> Self {
        Self {
            primary,
            fallback: MemoryRateLimitStore::new(),
            degraded: AtomicBool::new(false),
            max_requests,
            window,
        }
    }

    pub fn from_config(primary: Option<Arc<dyn RateLimitStore>>, config: &Config) -> Self {
        Self::new(
            primary,
            config.rate_limit_max_requests,
            config.rate_limit_window(),
        )
    }

    /// 启动进程内计数的定时清理
    pub fn start_cleanup(&self) -> JoinHandle<()> {
        self.fallback.spawn_cleanup(CLEANUP_INTERVAL)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.active() {
            Some(store) => store.name(),
            None => self.fallback.name(),
        }
    }

    fn active(&self) -> Option<&Arc<dyn RateLimitStore>> {
        if self.degraded.load(Ordering::Relaxed) {
            None
        } else {
            self.primary.as_ref()
        }
    }

    fn degrade(&self, err: StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                error = %err,
                "Shared rate limit store failed, switching to in-process counters"
            );
        }
    }

    /// 记录一次请求并判断是否放行
    pub async fn check_rate_limit(&self, key: &str, max: u32, window: Duration) -> RateLimitStatus {
        let key = keys::rate_limit_key(key);
        if let Some(store) = self.active() {
            match store.hit(&key, max, window).await {
                Ok(status) => return status,
                Err(e) => self.degrade(e),
            }
        }

        match self.fallback.hit(&key, max, window).await {
            Ok(status) => status,
            // 进程内计数不会失败，保守起见放行
            Err(_) => RateLimitStatus {
                allowed: true,
                limit: max,
                remaining: max,
                reset_time: Utc::now(),
            },
        }
    }

    /// 使用配置的默认上限和窗口
    pub async fn check(&self, key: &str) -> RateLimitStatus {
        self.check_rate_limit(key, self.max_requests, self.window)
            .await
    }
}

fn apply_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(status.limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(HEADER_RESET, HeaderValue::from(status.reset_time.timestamp()));
}

/// 429 响应体和 `Retry-After` 由 `AppError` 生成，这里补上限流头
fn rejection(status: &RateLimitStatus) -> Response {
    let mut response = AppError::RateLimitExceeded {
        limit: status.limit,
        reset_time: status.reset_time,
    }
    .into_response();
    apply_headers(response.headers_mut(), status);
    response
}

/// 按调用方地址限流，健康检查不计数
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path().ends_with("/health") {
        return next.run(req).await;
    }

    let ip = client_ip(&req);
    let status = limiter.check(&ip).await;

    if !status.allowed {
        tracing::warn!(
            client = %ip,
            path = %req.uri().path(),
            limit = status.limit,
            "Rate limit exceeded"
        );
        return rejection(&status);
    }

    let mut response = next.run(req).await;
    apply_headers(response.headers_mut(), &status);
    response
}
