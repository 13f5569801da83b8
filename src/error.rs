use std::time::Duration;

use axum::Json;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::utils::error_codes;

/// 网关对外暴露的错误类型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// 依赖服务返回错误或网络失败，可重试
    #[error("{service} request failed: {message}")]
    Upstream {
        service: String,
        status: Option<u16>,
        message: String,
    },

    /// 单次调用超过截止时间，可重试
    #[error("{service} timed out after {}ms", timeout.as_millis())]
    Timeout { service: String, timeout: Duration },

    /// 熔断器拒绝了调用
    #[error("{service} is temporarily unavailable")]
    ServiceUnavailable {
        service: String,
        retry_after: Duration,
    },

    /// 请求或响应结构不合法，不重试
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded, retry after {}", reset_time.to_rfc3339())]
    RateLimitExceeded {
        limit: u32,
        reset_time: DateTime<Utc>,
    },

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn upstream(service: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            service: service.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Upstream { .. } => error_codes::UPSTREAM_ERROR,
            AppError::Timeout { .. } => error_codes::UPSTREAM_TIMEOUT,
            AppError::ServiceUnavailable { .. } => error_codes::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::RateLimitExceeded { .. } => error_codes::RATE_LIMIT_EXCEEDED,
            AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 只有网络、超时和服务端错误进入重试循环
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Upstream { .. } | AppError::Timeout { .. })
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::ServiceUnavailable { retry_after, .. } => {
                Some(retry_after.as_secs_f64().ceil() as u64)
            }
            AppError::RateLimitExceeded { reset_time, .. } => {
                let secs = (*reset_time - Utc::now()).num_milliseconds().max(0) as f64 / 1000.0;
                Some(secs.ceil() as u64)
            }
            _ => None,
        }
    }
}

/// 统一的错误响应体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status_code: u16,
    pub timestamp: String,
    /// 仅限流错误携带
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            status_code: err.status_code().as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            reset_time: match err {
                AppError::RateLimitExceeded { reset_time, .. } => {
                    Some(reset_time.to_rfc3339_opts(SecondsFormat::Millis, true))
                }
                _ => None,
            },
        }
    }
}

// 请求体和查询参数的解析失败也走统一的错误响应
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if let Some(secs) = self.retry_after_secs() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
