// 缓存模块
// 优先使用共享的 Redis，出错后降级为进程内缓存，缓存故障不会让请求失败

pub mod keys;
pub mod models;
pub mod operations;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use operations::{CacheStore, MemoryCacheStore, StoreError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// `with_cache` 的参数
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    /// 设置后实际键为 `prefix:key`
    pub key_prefix: Option<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            key_prefix: None,
        }
    }
}

pub struct Cache {
    primary: Option<Arc<dyn CacheStore>>,
    fallback: MemoryCacheStore,
    degraded: AtomicBool,
}

impl Cache {
    /// `primary` 为 `None` 时只使用进程内缓存
    pub fn new(primary: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            primary,
            fallback: MemoryCacheStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// 当前生效的后端名称
    pub fn backend_name(&self) -> &'static str {
        match self.active() {
            Some(store) => store.name(),
            None => self.fallback.name(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn active(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.is_degraded() {
            None
        } else {
            self.primary.as_ref()
        }
    }

    fn degrade(&self, op: &str, key: &str, err: StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                op,
                key,
                error = %err,
                "Shared cache failed, switching to in-process cache"
            );
        }
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        if let Some(store) = self.active() {
            match store.get(key).await {
                Ok(value) => return value,
                Err(e) => self.degrade("get", key, e),
            }
        }
        self.fallback.get(key).await.ok().flatten()
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(store) = self.active() {
            match store.set(key, value, ttl).await {
                Ok(()) => return,
                Err(e) => self.degrade("set", key, e),
            }
        }
        let _ = self.fallback.set(key, value, ttl).await;
    }

    /// 读取缓存，未命中、过期或无法反序列化时返回 `None`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw, ttl).await,
            Err(e) => tracing::warn!(key, error = %e, "Value not cacheable, skipping"),
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Some(store) = self.active() {
            match store.delete(key).await {
                Ok(()) => return,
                Err(e) => self.degrade("delete", key, e),
            }
        }
        let _ = self.fallback.delete(key).await;
    }

    /// 读取缓存，未命中时调用 `producer` 并写入结果
    ///
    /// 不是原子操作：并发的两次未命中都会调用 `producer`，后写入的覆盖先写入的。
    /// `producer` 失败时不写缓存，错误原样返回。
    pub async fn with_cache<T, E, F, Fut>(
        &self,
        key: &str,
        options: &CacheOptions,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let full_key = match &options.key_prefix {
            Some(prefix) => keys::build_key(prefix, &[key]),
            None => key.to_string(),
        };

        if let Some(cached) = self.get(&full_key).await {
            return Ok(cached);
        }

        let value = producer().await?;
        self.set(&full_key, &value, options.ttl).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// 每次操作都失败的共享存储
    struct BrokenStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout(Duration::from_secs(1)))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout(Duration::from_secs(1)))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout(Duration::from_secs(1)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_until_ttl() {
        let cache = Cache::in_memory();
        cache.set("phone:1", &42u32, Duration::from_secs(30)).await;
        assert_eq!(cache.get::<u32>("phone:1").await, Some(42));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get::<u32>("phone:1").await, None);
    }

    #[tokio::test]
    async fn failing_primary_degrades_once_and_keeps_serving() {
        let broken = Arc::new(BrokenStore {
            calls: AtomicUsize::new(0),
        });
        let cache = Cache::new(Some(broken.clone()));
        assert_eq!(cache.backend_name(), "broken");

        cache.set("k", &"v", Duration::from_secs(60)).await;
        assert!(cache.is_degraded());
        assert_eq!(cache.backend_name(), "memory");
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));

        cache.delete("k").await;
        assert_eq!(cache.get::<String>("k").await, None);
        // 降级后不再访问共享存储
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_cache_calls_producer_only_on_miss() {
        let cache = Cache::in_memory();
        let calls = AtomicUsize::new(0);
        let options = CacheOptions {
            key_prefix: Some("search".into()),
            ..Default::default()
        };

        for _ in 0..3 {
            let value: Result<Vec<String>, String> = cache
                .with_cache("pixel", &options, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["Pixel 8".to_string()])
                })
                .await;
            assert_eq!(value.unwrap(), vec!["Pixel 8".to_string()]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get::<Vec<String>>("search:pixel").await.is_some());
    }

    #[tokio::test]
    async fn with_cache_never_stores_errors() {
        let cache = Cache::in_memory();
        let options = CacheOptions::default();

        let first: Result<u32, &str> = cache
            .with_cache("flaky", &options, || async { Err("boom") })
            .await;
        assert_eq!(first, Err("boom"));

        let second: Result<u32, &str> = cache
            .with_cache("flaky", &options, || async { Ok(7) })
            .await;
        assert_eq!(second, Ok(7));
    }
}
