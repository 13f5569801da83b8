//! 缓存键模块
//!
//! 键格式为 `prefix:part1:part2:...`。各部分不得包含分隔符 `:`，
//! 这是调用方的责任，运行时不做检查；来源不可控的部分应先经过 [`digest`]。

use sha2::{Digest, Sha256};

pub const SEPARATOR: &str = ":";

/// 网关结果缓存键前缀
pub const GATEWAY_PREFIX: &str = "gateway";

/// 限流计数键前缀
pub const RATE_LIMIT_PREFIX: &str = "rate_limit";

/// 拼接缓存键
pub fn build_key<S: AsRef<str>>(prefix: &str, parts: &[S]) -> String {
    let mut key = prefix.to_string();
    for part in parts {
        key.push_str(SEPARATOR);
        key.push_str(part.as_ref());
    }
    key
}

/// 生成网关调用结果的缓存键
pub fn gateway_key(service: &str, operation: &str, params: &serde_json::Value) -> String {
    let params_digest = digest(&params.to_string());
    build_key(GATEWAY_PREFIX, &[service, operation, params_digest.as_str()])
}

/// 生成限流计数键
pub fn rate_limit_key(client: &str) -> String {
    build_key(RATE_LIMIT_PREFIX, &[client])
}

/// 任意文本的 SHA-256 十六进制摘要，不含分隔符
pub fn digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
