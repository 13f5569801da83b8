//! 熔断器
//!
//! ```text
//! CLOSED    --失败数达到阈值-->        OPEN
//! OPEN      --距上次失败超过冷却时间--> HALF_OPEN（读取状态或执行时惰性切换）
//! HALF_OPEN --连续成功达到阈值-->      CLOSED
//! HALF_OPEN --任意一次失败-->          OPEN
//! ```
//!
//! CLOSED 状态下每次成功只把失败计数减一（不低于 0），
//! 偶发失败混在大量成功中不会触发熔断。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// 打开熔断所需的失败数
    pub failure_threshold: u32,
    /// OPEN 到 HALF_OPEN 的冷却时间
    pub reset_timeout: Duration,
    /// HALF_OPEN 下关闭熔断所需的成功数
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// 熔断器打开时直接拒绝调用，被包装的操作不会执行
#[derive(Debug, Clone, Error)]
#[error("circuit breaker for {service} is open")]
pub struct CircuitOpenError {
    pub service: String,
    /// 距离进入 HALF_OPEN 的剩余时间
    pub retry_after: Duration,
}

/// `execute` 的错误：熔断器拒绝，或被包装操作自身的错误（原样返回）
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error(transparent)]
    Open(CircuitOpenError),

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub ms_since_last_failure: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// 当前状态；OPEN 且冷却时间已过时切换为 HALF_OPEN
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    pub fn stats(&self) -> CircuitStats {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);
        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            ms_since_last_failure: inner
                .last_failure_at
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
        }
    }

    /// 强制回到 CLOSED 并清空计数
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_at = None;
        tracing::info!(service = %self.name, "Circuit manually reset");
    }

    /// 通过熔断器执行一次调用
    ///
    /// 锁只在检查和记录结果时持有，不跨越 `f` 的执行。
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire().map_err(BreakerError::Open)?;

        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner
            .last_failure_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        tracing::debug!(service = %self.name, "Circuit open, rejecting call");
        Err(CircuitOpenError {
            service: self.name.clone(),
            retry_after: self.config.reset_timeout.saturating_sub(elapsed),
        })
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let cooled_down = inner
            .last_failure_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.config.reset_timeout);
        if cooled_down {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            tracing::info!(service = %self.name, "Circuit half-open, probing for recovery");
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!(service = %self.name, "Circuit closed after recovery");
                }
            }
            CircuitState::Closed | CircuitState::Open => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                tracing::warn!(service = %self.name, "Circuit reopened after failed probe");
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    service = %self.name,
                    failures = inner.failure_count,
                    "Circuit opened after repeated failures"
                );
            }
            _ => {}
        }
    }

    #[cfg(test)]
    fn counts(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.failure_count, inner.success_count)
    }
}

/// 按依赖名称持有熔断器，启动时构建一次并注入网关
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    pub fn with_breaker(self, name: &str, config: CircuitBreakerConfig) -> Self {
        self.breakers
            .write()
            .insert(name.to_string(), Arc::new(CircuitBreaker::new(name, config)));
        self
    }

    /// 获取依赖对应的熔断器，未注册的依赖使用默认配置创建
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }
        self.breakers
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.default_config.clone())))
            .clone()
    }

    pub fn stats(&self) -> Vec<CircuitStats> {
        let mut stats: Vec<_> = self.breakers.read().values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}
