use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::Request};

/// 从请求中解析调用方地址
///
/// 优先使用反向代理写入的 `x-real-ip` / `x-forwarded-for`，其次是连接信息，
/// 都拿不到时返回 `"unknown"`。
pub fn client_ip<B>(req: &Request<B>) -> String {
    header_ip(req, "x-real-ip")
        .or_else(|| header_ip(req, "x-forwarded-for"))
        .map(str::to_string)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// 头部中第一个非空的地址，空白值视为缺失
fn header_ip<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
}

pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const UPSTREAM_TIMEOUT: &str = "UPSTREAM_TIMEOUT";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
