use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::{map_send_error, read_json_object};
use crate::error::AppError;

pub const SEARCH_SERVICE: &str = "search-service";

/// 手机搜索服务客户端
#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn search(&self, query: &str, timeout: Duration) -> Result<Value, AppError> {
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query.trim())])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(SEARCH_SERVICE, timeout, e))?;

        read_json_object(SEARCH_SERVICE, response).await
    }
}
