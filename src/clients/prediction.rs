use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::{map_send_error, read_json_object};
use crate::error::AppError;

pub const ML_SERVICE: &str = "ml-service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionEndpoint {
    Price,
    Ram,
    Battery,
    Brand,
    Advanced,
}

impl PredictionEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            PredictionEndpoint::Price => "predict-price",
            PredictionEndpoint::Ram => "predict-ram",
            PredictionEndpoint::Battery => "predict-battery",
            PredictionEndpoint::Brand => "predict-brand",
            PredictionEndpoint::Advanced => "advanced-predict",
        }
    }
}

/// 机器学习预测服务客户端
#[derive(Clone)]
pub struct PredictionClient {
    http: Client,
    base_url: String,
}

impl PredictionClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn predict(
        &self,
        endpoint: PredictionEndpoint,
        features: &Value,
        timeout: Duration,
    ) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        tracing::debug!(%url, "Calling prediction service");
        let response = self
            .http
            .post(url)
            .json(features)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(ML_SERVICE, timeout, e))?;

        read_json_object(ML_SERVICE, response).await
    }

    pub async fn health(&self, timeout: Duration) -> Result<Value, AppError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(ML_SERVICE, timeout, e))?;

        read_json_object(ML_SERVICE, response).await
    }
}
