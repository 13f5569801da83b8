use serde_json::Value;

use crate::gateway::GatewayResponse;

/// 预测结果的结构由预测服务决定，这里原样透传
pub type PredictionResponse = GatewayResponse<Value>;
