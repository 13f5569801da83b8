use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::RETRY_AFTER},
    response::Response,
};
use gateway_backend::{
    middleware::{HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, REQUEST_ID_HEADER},
    router::create_router,
};
use serde_json::Value;
use tower::ServiceExt;

mod common;

fn app(max_requests: u32) -> Router {
    let gateway = common::gateway(common::UNREACHABLE, common::UNREACHABLE, 5);
    create_router(common::app_state(gateway, max_requests))
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

fn get(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-real-ip", ip)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn status_reports_backends_and_rate_limit_headers() {
    let app = app(10);

    let response = send(&app, get("/api/status", "10.1.1.1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[HEADER_LIMIT], "10");
    assert_eq!(response.headers()[HEADER_REMAINING], "9");
    assert!(response.headers().contains_key(HEADER_RESET));
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body = json_body(response).await;
    assert_eq!(body["cacheBackend"], "memory");
    assert_eq!(body["rateLimitBackend"], "memory");
    let circuits = body["circuits"].as_array().unwrap();
    assert_eq!(circuits.len(), 2);
    assert_eq!(circuits[0]["name"], "ml-service");
    assert_eq!(circuits[0]["state"], "CLOSED");
}

#[tokio::test]
async fn rejects_after_limit_per_client() {
    let app = app(2);

    for remaining in ["1", "0"] {
        let response = send(&app, get("/api/status", "10.2.2.2")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[HEADER_REMAINING], remaining);
    }

    let response = send(&app, get("/api/status", "10.2.2.2")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[HEADER_REMAINING], "0");
    assert!(response.headers().contains_key(RETRY_AFTER));

    let body = json_body(response).await;
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["statusCode"], 429);
    assert!(body["timestamp"].is_string());
    assert!(body["resetTime"].is_string());

    // 其他客户端各自计数
    let response = send(&app, get("/api/status", "10.3.3.3")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let app = app(1);

    for _ in 0..3 {
        let response = send(&app, get("/api/health", "10.4.4.4")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(HEADER_LIMIT));

        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
    }
}

#[tokio::test]
async fn invalid_features_return_validation_error() {
    let app = app(10);

    let request = Request::builder()
        .method("POST")
        .uri("/api/predict/price")
        .header("content-type", "application/json")
        .header("x-real-ip", "10.5.5.5")
        .body(Body::from("[1, 2, 3]"))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["statusCode"], 400);
}

async fn assert_validation_body(response: Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["statusCode"], 400);
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_json_body_is_structured_error() {
    let app = app(10);

    let request = Request::builder()
        .method("POST")
        .uri("/api/predict/ram")
        .header("content-type", "application/json")
        .header("x-real-ip", "10.7.7.7")
        .body(Body::from("{\"ram\": "))
        .unwrap();
    assert_validation_body(send(&app, request).await).await;
}

#[tokio::test]
async fn missing_content_type_is_structured_error() {
    let app = app(10);

    let request = Request::builder()
        .method("POST")
        .uri("/api/predict/battery")
        .header("x-real-ip", "10.8.8.8")
        .body(Body::from("{\"battery\": 5000}"))
        .unwrap();
    assert_validation_body(send(&app, request).await).await;
}

#[tokio::test]
async fn missing_search_query_is_structured_error() {
    let app = app(10);

    let response = send(&app, get("/api/search", "10.9.9.9")).await;
    assert_validation_body(response).await;
}

#[tokio::test]
async fn unreachable_search_service_is_bad_gateway() {
    let app = app(10);

    let response = send(&app, get("/api/search?q=pixel", "10.6.6.6")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await;
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}
