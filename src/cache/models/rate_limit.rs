use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// 固定窗口计数记录
#[derive(Debug, Clone)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: Instant,
}

/// 一次限流检查的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}
