//! 依赖服务适配器
//!
//! 只负责构造请求和校验响应结构，重试、熔断和缓存都由网关处理。

pub mod prediction;
pub mod search;

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::AppError;

pub use prediction::{PredictionClient, PredictionEndpoint};
pub use search::SearchClient;

/// 构造共享的 HTTP 客户端，超时在每次请求上单独设置
pub fn http_client() -> Result<Client, AppError> {
    Client::builder()
        .pool_max_idle_per_host(32)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn map_send_error(service: &str, timeout: Duration, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout {
            service: service.to_string(),
            timeout,
        }
    } else {
        AppError::upstream(service, None, format!("Request failed: {e}"))
    }
}

/// 非 2xx 状态视为依赖故障；响应体必须是 JSON 对象
pub(crate) async fn read_json_object(service: &str, response: Response) -> Result<Value, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(service, status = %status, body = %body, "Dependency returned an error");
        return Err(AppError::upstream(
            service,
            Some(status.as_u16()),
            format!("HTTP {status}"),
        ));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| AppError::Validation(format!("{service} returned malformed JSON: {e}")))?;

    if !body.is_object() {
        return Err(AppError::Validation(format!(
            "{service} returned a non-object response"
        )));
    }
    Ok(body)
}
