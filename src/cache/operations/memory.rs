use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{CacheStore, StoreError, clamp_duration};
use crate::cache::models::CacheEntry;

/// 超过该条目数后，每次写入都会清理全部过期条目
pub const MAX_MEMORY_ENTRIES: usize = 1000;

/// 进程内缓存，Redis 不可用时的降级存储
///
/// 只在当前进程内可见，多实例部署时各实例的数据互不共享。
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn sweep_expired(entries: &mut HashMap<String, CacheEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        tracing::debug!(
            removed = before - entries.len(),
            remaining = entries.len(),
            "Swept expired in-process cache entries"
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: now + clamp_duration(ttl),
            },
        );
        if entries.len() > MAX_MEMORY_ENTRIES {
            Self::sweep_expired(&mut entries, now);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let store = MemoryCacheStore::new();
        store
            .set("k", "\"v\"", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("\"v\""));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        // 过期读取会顺带删除
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_runs_only_past_capacity() {
        let store = MemoryCacheStore::new();
        for i in 0..MAX_MEMORY_ENTRIES {
            store
                .set(&format!("short:{i}"), "1", Duration::from_secs(1))
                .await
                .unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.len(), MAX_MEMORY_ENTRIES);

        store
            .set("long", "2", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn oversized_ttl_is_clamped() {
        let store = MemoryCacheStore::new();
        store.set("k", "1", Duration::MAX).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = MemoryCacheStore::new();
        store.set("k", "1", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
