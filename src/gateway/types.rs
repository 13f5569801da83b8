use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一次出站调用的描述，用于选择熔断器和生成缓存键
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// 依赖名称，对应一个熔断器
    pub service: String,
    pub operation: String,
    pub params: Value,
}

impl GatewayRequest {
    pub fn new(service: &str, operation: &str, params: Value) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub use_cache: bool,
    pub cache_ttl: Duration,
    /// 单次尝试的截止时间
    pub timeout: Duration,
    /// 总尝试次数
    pub retries: u32,
    pub skip_circuit_breaker: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(10),
            retries: 2,
            skip_circuit_breaker: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub cached: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// 网关统一响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse<T> {
    pub data: T,
    pub metadata: ResponseMetadata,
}
