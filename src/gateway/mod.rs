//! 出站调用网关
//!
//! ```text
//! execute(request, options, call)
//!     → 缓存命中：直接返回，不经过熔断器和重试
//!     → 未命中：熔断器 → 重试循环（每次尝试带超时）
//!     → 成功：后台写缓存，返回 {data, metadata}
//!     → 熔断器拒绝：映射为 ServiceUnavailable；其他错误原样返回
//! ```

pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::cache::{Cache, keys};
use crate::clients::prediction::ML_SERVICE;
use crate::clients::search::SEARCH_SERVICE;
use crate::clients::{PredictionClient, PredictionEndpoint, SearchClient};
use crate::error::AppError;
use crate::resilience::{BreakerError, CircuitBreakerRegistry, RetryPolicy, retry};

pub use types::{GatewayRequest, GatewayResponse, RequestOptions, ResponseMetadata};

const PREDICTION_CACHE_TTL: Duration = Duration::from_secs(3600);
const PREDICTION_TIMEOUT: Duration = Duration::from_secs(10);
const ADVANCED_PREDICTION_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_CACHE_TTL: Duration = Duration::from_secs(300);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Gateway {
    cache: Arc<Cache>,
    breakers: Arc<CircuitBreakerRegistry>,
    prediction: PredictionClient,
    search: SearchClient,
    retry_base_delay: Duration,
}

impl Gateway {
    pub fn new(
        cache: Arc<Cache>,
        breakers: Arc<CircuitBreakerRegistry>,
        prediction: PredictionClient,
        search: SearchClient,
    ) -> Self {
        Self {
            cache,
            breakers,
            prediction,
            search,
            retry_base_delay: retry::DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// 通过缓存、熔断器和重试执行一次调用
    pub async fn execute<T, F, Fut>(
        &self,
        request: &GatewayRequest,
        options: &RequestOptions,
        call: F,
    ) -> Result<GatewayResponse<T>, AppError>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let started = Instant::now();
        let service = request.service.as_str();

        let cache_key = options
            .use_cache
            .then(|| keys::gateway_key(service, &request.operation, &request.params));

        if let Some(key) = &cache_key {
            if let Some(data) = self.cache.get::<T>(key).await {
                return Ok(GatewayResponse {
                    data,
                    metadata: ResponseMetadata {
                        cached: true,
                        response_time_ms: elapsed_ms(started),
                        retries: None,
                    },
                });
            }
        }

        let policy = RetryPolicy {
            attempts: options.retries.max(1),
            base_delay: self.retry_base_delay,
        };
        let call = &call;
        let timeout = options.timeout;
        let attempt = move || async move {
            match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout {
                    service: service.to_string(),
                    timeout,
                }),
            }
        };

        let outcome = if options.skip_circuit_breaker {
            policy.run(service, attempt).await
        } else {
            let breaker = self.breakers.get(service);
            breaker
                .execute(|| policy.run(service, attempt))
                .await
                .map_err(|e| match e {
                    BreakerError::Open(open) => {
                        tracing::warn!(service, operation = %request.operation, "{}", open);
                        AppError::ServiceUnavailable {
                            service: open.service,
                            retry_after: open.retry_after,
                        }
                    }
                    BreakerError::Inner(e) => e,
                })
        };

        let (data, retries) = outcome?;

        if let Some(key) = cache_key {
            let cache = self.cache.clone();
            let value = data.clone();
            let ttl = options.cache_ttl;
            tokio::spawn(async move {
                cache.set(&key, &value, ttl).await;
            });
        }

        let response_time_ms = elapsed_ms(started);
        tracing::debug!(
            service,
            operation = %request.operation,
            response_time_ms,
            retries,
            "Gateway call succeeded"
        );

        Ok(GatewayResponse {
            data,
            metadata: ResponseMetadata {
                cached: false,
                response_time_ms,
                retries: Some(retries),
            },
        })
    }

    pub async fn predict(
        &self,
        endpoint: PredictionEndpoint,
        features: Value,
    ) -> Result<GatewayResponse<Value>, AppError> {
        if !features.is_object() {
            return Err(AppError::Validation(
                "prediction features must be a JSON object".to_string(),
            ));
        }

        let timeout = match endpoint {
            PredictionEndpoint::Advanced => ADVANCED_PREDICTION_TIMEOUT,
            _ => PREDICTION_TIMEOUT,
        };
        let options = RequestOptions {
            cache_ttl: PREDICTION_CACHE_TTL,
            timeout,
            ..Default::default()
        };
        let request = GatewayRequest::new(ML_SERVICE, endpoint.path(), features);

        self.execute(&request, &options, || {
            self.prediction.predict(endpoint, &request.params, timeout)
        })
        .await
    }

    pub async fn predict_price(&self, features: Value) -> Result<GatewayResponse<Value>, AppError> {
        self.predict(PredictionEndpoint::Price, features).await
    }

    pub async fn predict_ram(&self, features: Value) -> Result<GatewayResponse<Value>, AppError> {
        self.predict(PredictionEndpoint::Ram, features).await
    }

    pub async fn predict_battery(
        &self,
        features: Value,
    ) -> Result<GatewayResponse<Value>, AppError> {
        self.predict(PredictionEndpoint::Battery, features).await
    }

    pub async fn predict_brand(&self, features: Value) -> Result<GatewayResponse<Value>, AppError> {
        self.predict(PredictionEndpoint::Brand, features).await
    }

    pub async fn advanced_predict(
        &self,
        features: Value,
    ) -> Result<GatewayResponse<Value>, AppError> {
        self.predict(PredictionEndpoint::Advanced, features).await
    }

    pub async fn search_phones(&self, query: &str) -> Result<GatewayResponse<Value>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation(
                "search query must not be empty".to_string(),
            ));
        }

        let options = RequestOptions {
            cache_ttl: SEARCH_CACHE_TTL,
            timeout: SEARCH_TIMEOUT,
            ..Default::default()
        };
        let request = GatewayRequest::new(SEARCH_SERVICE, "search", json!({ "q": query }));

        self.execute(&request, &options, || self.search.search(query, SEARCH_TIMEOUT))
            .await
    }

    /// 预测服务健康检查：不缓存、只尝试一次、不计入熔断
    pub async fn health(&self) -> Result<GatewayResponse<Value>, AppError> {
        let options = RequestOptions {
            use_cache: false,
            timeout: HEALTH_TIMEOUT,
            retries: 1,
            skip_circuit_breaker: true,
            ..Default::default()
        };
        let request = GatewayRequest::new(ML_SERVICE, "health", Value::Null);

        self.execute(&request, &options, || self.prediction.health(HEALTH_TIMEOUT))
            .await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
