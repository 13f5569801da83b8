use tokio::time::Instant;

/// 进程内缓存条目，值以 JSON 文本保存，与 Redis 中的格式一致
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
