//! 指数退避重试

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 总尝试次数，至少为 1
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// 第 `retry` 次重试前的等待时间（从 1 开始）：500ms, 1000ms, 2000ms, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(retry - 1);
        self.base_delay.saturating_mul(factor)
    }

    /// 执行 `op` 直到成功、遇到不可重试的错误或用尽次数
    ///
    /// 成功时返回结果和实际重试次数；失败时返回最后一次的错误。
    pub async fn run<T, F, Fut>(&self, service: &str, mut op: F) -> Result<(T, u32), AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let attempts = self.attempts.max(1);
        let mut retries = 0;

        loop {
            match op().await {
                Ok(value) => return Ok((value, retries)),
                Err(e) if !e.is_retryable() || retries + 1 >= attempts => {
                    if retries > 0 {
                        tracing::warn!(service, retries, error = %e, "Giving up after retries");
                    }
                    return Err(e);
                }
                Err(e) => {
                    retries += 1;
                    let delay = self.backoff(retries);
                    tracing::debug!(
                        service,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::new(4);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_returns_last_error() {
        let policy = RetryPolicy::new(3);
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<((), u32), AppError> = policy
            .run("ml-service", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(AppError::upstream("ml-service", Some(503), format!("attempt {n}")))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1500));
        match result {
            Err(AppError::Upstream { message, .. }) => assert_eq!(message, "attempt 3"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_retries_used_on_success() {
        let policy = RetryPolicy::new(3);
        let calls = AtomicU32::new(0);

        let (value, retries) = policy
            .run("search-service", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::Timeout {
                        service: "search-service".into(),
                        timeout: Duration::from_secs(5),
                    })
                } else {
                    Ok("results")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "results");
        assert_eq!(retries, 1);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let policy = RetryPolicy::new(5);
        let calls = AtomicU32::new(0);

        let result: Result<((), u32), AppError> = policy
            .run("ml-service", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Validation("missing field".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
