use axum::{
    body::{Body, to_bytes},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 读取错误响应体时的上限
const MAX_LOGGED_BODY: usize = 4096;

/// 为每个请求分配 request id，并记录 5xx 响应及其响应体
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let span = info_span!("request", id = %request_id, %method, %path);
    let mut response = next.run(req).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            span.in_scope(|| error!("Failed to read error response body: {}", e));
            return Response::from_parts(parts, Body::empty());
        }
    };

    span.in_scope(|| {
        error!(
            status = %parts.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            body = %String::from_utf8_lossy(&bytes),
            "Server error occurred"
        )
    });

    // 响应体已被读取，重新构建响应
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
