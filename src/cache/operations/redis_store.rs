use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};

use super::{CacheStore, StoreError, clamp_duration};

/// 启动时探测 Redis 的超时时间
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// 单条命令的超时时间，超时视为后端故障
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// 基于 Redis 的共享存储，多实例之间共享
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// 连接并 PING 一次，失败时返回 `None`，调用方改用进程内存储
    pub async fn connect(url: &str) -> Option<Self> {
        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Redis URL, using in-process store");
                return None;
            }
        };

        let probe = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(conn)
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(conn)) => {
                tracing::info!("Connected to Redis");
                Some(Self::new(conn))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Redis unavailable, using in-process store");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = CONNECT_TIMEOUT.as_millis() as u64,
                    "Redis connection timed out, using in-process store"
                );
                None
            }
        }
    }

    pub(crate) fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    pub(crate) async fn with_deadline<T, F>(fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(COMMAND_TIMEOUT, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(COMMAND_TIMEOUT)),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection();
        Self::with_deadline(conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection();
        let ttl_ms = (clamp_duration(ttl).as_millis() as u64).max(1);
        Self::with_deadline(conn.pset_ex(key, value, ttl_ms)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection();
        Self::with_deadline(conn.del(key)).await
    }
}
