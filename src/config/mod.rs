use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::operations::MAX_STORE_DURATION;
use crate::resilience::CircuitBreakerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// 未配置时只使用进程内缓存和限流
    pub redis_url: Option<String>,
    pub ml_service_url: String,
    pub search_service_url: String,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub ml_failure_threshold: u32,
    pub ml_reset_timeout_ms: u64,
    pub search_failure_threshold: u32,
    pub search_reset_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            redis_url: None,
            ml_service_url: "http://localhost:8000".to_string(),
            search_service_url: "http://localhost:8001".to_string(),
            rate_limit_window_ms: 15 * 60 * 1000,
            rate_limit_max_requests: 100,
            ml_failure_threshold: 5,
            ml_reset_timeout_ms: 60_000,
            search_failure_threshold: 5,
            search_reset_timeout_ms: 60_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，缺失的键使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let rate_limit_window_ms = parse_or(
            &lookup,
            "RATE_LIMIT_WINDOW_MS",
            defaults.rate_limit_window_ms,
        )?;
        if rate_limit_window_ms == 0
            || u128::from(rate_limit_window_ms) > MAX_STORE_DURATION.as_millis()
        {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW_MS",
                value: rate_limit_window_ms.to_string(),
            });
        }

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            api_base_uri: lookup("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            ml_service_url: lookup("ML_SERVICE_URL").unwrap_or(defaults.ml_service_url),
            search_service_url: lookup("SEARCH_SERVICE_URL")
                .unwrap_or(defaults.search_service_url),
            rate_limit_window_ms,
            rate_limit_max_requests: parse_or(
                &lookup,
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            ml_failure_threshold: parse_or(
                &lookup,
                "ML_FAILURE_THRESHOLD",
                defaults.ml_failure_threshold,
            )?,
            ml_reset_timeout_ms: parse_or(
                &lookup,
                "ML_RESET_TIMEOUT_MS",
                defaults.ml_reset_timeout_ms,
            )?,
            search_failure_threshold: parse_or(
                &lookup,
                "SEARCH_FAILURE_THRESHOLD",
                defaults.search_failure_threshold,
            )?,
            search_reset_timeout_ms: parse_or(
                &lookup,
                "SEARCH_RESET_TIMEOUT_MS",
                defaults.search_reset_timeout_ms,
            )?,
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn ml_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.ml_failure_threshold,
            reset_timeout: Duration::from_millis(self.ml_reset_timeout_ms),
            ..Default::default()
        }
    }

    pub fn search_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.search_failure_threshold,
            reset_timeout: Duration::from_millis(self.search_reset_timeout_ms),
            ..Default::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
