//! 缓存与限流的存储策略
//!
//! 共享的 Redis 存储和进程内存储实现同一组接口，
//! 上层的 [`Cache`](crate::cache::Cache) 与
//! [`RateLimiter`](crate::middleware::RateLimiter) 负责在两者之间切换。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::models::RateLimitStatus;

pub mod memory;
pub mod rate_limit;
pub mod redis_store;

pub use memory::MemoryCacheStore;
pub use rate_limit::MemoryRateLimitStore;
pub use redis_store::RedisStore;

/// 过期时间和限流窗口的上限，超出的值按上限处理
pub const MAX_STORE_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn clamp_duration(duration: Duration) -> Duration {
    duration.min(MAX_STORE_DURATION)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// 键值缓存存储，值为序列化后的 JSON 文本
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// 固定窗口限流计数存储
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// 记录一次请求并返回本窗口内的状态
    async fn hit(
        &self,
        key: &str,
        max: u32,
        window: Duration,
    ) -> Result<RateLimitStatus, StoreError>;
}
