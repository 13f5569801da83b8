use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{RateLimitStore, RedisStore, StoreError, clamp_duration};
use crate::cache::models::{RateLimitRecord, RateLimitStatus};

/// 进程内限流记录的清理周期
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

fn reset_time_after(remaining: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    TimeDelta::from_std(clamp_duration(remaining))
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(now)
}

/// Redis 固定窗口计数：INCR 计数，首个请求设置窗口过期时间
#[async_trait]
impl RateLimitStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn hit(
        &self,
        key: &str,
        max: u32,
        window: Duration,
    ) -> Result<RateLimitStatus, StoreError> {
        let mut conn = self.connection();
        let window_ms = clamp_duration(window).as_millis() as i64;

        let count: u64 = Self::with_deadline(conn.incr(key, 1)).await?;
        if count == 1 {
            let _: () = Self::with_deadline(conn.pexpire(key, window_ms)).await?;
        }

        let mut ttl_ms: i64 = Self::with_deadline(conn.pttl(key)).await?;
        if ttl_ms < 0 {
            // 计数存在但没有过期时间（设置过期前进程退出），补上窗口
            let _: () = Self::with_deadline(conn.pexpire(key, window_ms)).await?;
            ttl_ms = window_ms;
        }

        Ok(RateLimitStatus {
            allowed: count <= u64::from(max),
            limit: max,
            remaining: u64::from(max).saturating_sub(count) as u32,
            reset_time: reset_time_after(Duration::from_millis(ttl_ms as u64)),
        })
    }
}

/// 进程内固定窗口限流，Redis 不可用时使用
///
/// 计数只在当前进程内有效，与 Redis 中的计数相互独立。
#[derive(Default)]
pub struct MemoryRateLimitStore {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 定时清理已过窗口的记录，存储被释放后任务自动退出
    pub fn spawn_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let records = Arc::downgrade(&self.records);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };
                let pruned = Self::prune(&mut records.lock(), Instant::now());
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned expired in-process rate limit records");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn prune(records: &mut HashMap<String, RateLimitRecord>, now: Instant) -> usize {
        let before = records.len();
        records.retain(|_, record| now <= record.window_reset_at);
        before - records.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn hit(
        &self,
        key: &str,
        max: u32,
        window: Duration,
    ) -> Result<RateLimitStatus, StoreError> {
        let now = Instant::now();
        let window = clamp_duration(window);
        let mut records = self.records.lock();

        let record = records
            .entry(key.to_string())
            .or_insert_with(|| RateLimitRecord {
                count: 0,
                window_reset_at: now + window,
            });

        // 窗口已过，开启新窗口
        if now > record.window_reset_at {
            record.count = 0;
            record.window_reset_at = now + window;
        }

        let allowed = record.count < max;
        if allowed {
            record.count += 1;
        }

        Ok(RateLimitStatus {
            allowed,
            limit: max,
            remaining: max.saturating_sub(record.count),
            reset_time: reset_time_after(record.window_reset_at.saturating_duration_since(now)),
        })
    }
}
