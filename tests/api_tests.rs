//! End-to-end tests for the translate endpoint.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` and the
//! Gemini API is replaced by a wiremock server.

use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
};
use clap::Parser;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use dialect_gateway::{config::Args, routes::build_router, state::AppState};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash-latest:generateContent";

// ==================== Helpers ====================

fn app_with(server: &MockServer, extra: &[&str]) -> Router {
    let upstream = format!("{}/v1beta", server.uri());
    let mut argv = vec![
        "dialect-gateway",
        "--api-key",
        "test-key",
        "--upstream-url",
        upstream.as_str(),
    ];
    argv.extend_from_slice(extra);

    let args = Args::try_parse_from(argv).expect("args should parse");
    let state = AppState::from_args(&args).expect("state should build");
    build_router(Arc::new(state))
}

fn app(server: &MockServer) -> Router {
    app_with(server, &[])
}

fn gemini_text(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP",
            "index": 0
        }]
    })
}

async fn mount_gemini(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

fn post_translate(ip: &str, body: Value) -> Request<Body> {
    Request::post("/api/translate")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .header("user-agent", "integration-test")
        .header("cf-ipcountry", "MX")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_body() -> Value {
    json!({
        "dialect": "Translate to Mexican street slang like Peso Pluma uses",
        "text": "I'm going to the store to buy some groceries"
    })
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn health(app: &Router) -> Value {
    let response = send(app, Request::get("/api/translate").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

// ==================== Method handling ====================

#[tokio::test]
async fn test_options_returns_cors_and_security_headers() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(
        &app,
        Request::options("/api/translate").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert_eq!(
        headers["strict-transport-security"],
        "max-age=31536000; includeSubDomains"
    );

    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_get_returns_health_snapshot() {
    let server = MockServer::start().await;
    let app = app(&server);

    let body = health(&app).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["requests"]["total"], 0);
    assert_eq!(body["requests"]["errors"], 0);
    assert_eq!(body["requests"]["success_rate"], 100.0);
    assert_eq!(body["performance"]["active_connections"], 0);
    assert!(body["performance"]["memory_usage"]["rss_bytes"].is_u64());
    assert!(body["popular_dialects"].as_array().unwrap().is_empty());
    assert!(body["global_usage"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(&app, Request::put("/api/translate").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let body = json_body(response).await;
    assert_eq!(body["error"], "Method not allowed");
    assert_eq!(body["allowed_methods"], json!(["POST", "GET", "OPTIONS"]));
}

#[tokio::test]
async fn test_root_path_serves_same_endpoint() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

// ==================== Translation ====================

#[tokio::test]
async fn test_successful_translation() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(200).set_body_json(gemini_text("Hola"))).await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.10", valid_body())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "20");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "19");

    let body = json_body(response).await;
    assert_eq!(body["translation"], "Hola");
    assert_eq!(body["metadata"]["dialect"], "Translate to Mexican");
    assert_eq!(body["metadata"]["confidence"], 94.7);
    assert_eq!(body["metadata"]["region"], "MX");
    assert_eq!(body["metadata"]["service_version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["metadata"]["request_id"].as_str().unwrap().len(), 16);
    assert!(body["metadata"]["processing_time_ms"].is_u64());

    let stats = health(&app).await;
    assert_eq!(stats["requests"]["total"], 1);
    assert_eq!(stats["requests"]["errors"], 0);
    assert_eq!(stats["popular_dialects"], json!([["Translate to Mexican", 1]]));
    assert_eq!(stats["global_usage"], json!([["MX", 1]]));
}

#[tokio::test]
async fn test_upstream_overloaded_maps_to_429() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(429).set_body_string("quota")).await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.11", valid_body())).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "30");

    let body = json_body(response).await;
    assert_eq!(body["service"], "gemini");
    assert_eq!(body["retry_after"], 30);
}

#[tokio::test]
async fn test_upstream_forbidden_maps_to_503() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(403)).await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.12", valid_body())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["service"], "gemini");
}

#[tokio::test]
async fn test_upstream_server_error_maps_to_502() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(500)).await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.13", valid_body())).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Translation service error");
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn test_safety_block_maps_to_400() {
    let server = MockServer::start().await;
    mount_gemini(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY", "index": 0}]
        })),
    )
    .await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.14", valid_body())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["reason"], "safety_filter");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_empty_upstream_text_maps_to_500() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(200).set_body_json(gemini_text("  "))).await;
    let app = app(&server);

    let response = send(&app, post_translate("203.0.113.15", valid_body())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["request_id"].is_string());
}

#[tokio::test]
async fn test_failures_are_counted_consistently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text("ok")))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_gemini(&server, ResponseTemplate::new(500)).await;
    let app = app(&server);

    for _ in 0..4 {
        send(&app, post_translate("203.0.113.16", valid_body())).await;
    }

    let stats = health(&app).await;
    let total = stats["requests"]["total"].as_u64().unwrap();
    let errors = stats["requests"]["errors"].as_u64().unwrap();
    assert_eq!(total, 4);
    assert_eq!(errors, 1);
    assert_eq!(stats["requests"]["success_rate"], 75.0);
}

// ==================== Validation ====================

#[tokio::test]
async fn test_missing_fields_never_reach_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_text("nope")))
        .expect(0)
        .mount(&server)
        .await;
    let app = app(&server);

    for body in [
        json!({"text": "hello"}),
        json!({"dialect": "pirate"}),
        json!({"dialect": "", "text": "hello"}),
        json!({}),
    ] {
        let response = send(&app, post_translate("203.0.113.20", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Missing required fields: dialect and text");
        assert!(body["request_id"].is_string());
    }

    let stats = health(&app).await;
    assert_eq!(stats["requests"]["total"], 0);
    assert_eq!(stats["requests"]["errors"], 0);
}

#[tokio::test]
async fn test_oversized_fields_rejected() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(
        &app,
        post_translate("203.0.113.21", json!({"dialect": "pirate", "text": "a".repeat(2001)})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["current_length"], 2001);
    assert_eq!(body["max_length"], 2000);

    let response = send(
        &app,
        post_translate("203.0.113.21", json!({"dialect": "d".repeat(501), "text": "hi"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["max_length"], 500);
}

#[tokio::test]
async fn test_script_only_input_rejected_after_sanitize() {
    let server = MockServer::start().await;
    let app = app(&server);

    let response = send(
        &app,
        post_translate(
            "203.0.113.22",
            json!({"dialect": "pirate", "text": "<script>alert(1)</script>"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid input after sanitization");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let server = MockServer::start().await;
    let app = app(&server);

    let request = Request::post("/api/translate")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.23")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Rate limiting ====================

#[tokio::test]
async fn test_twenty_first_request_is_rate_limited() {
    let server = MockServer::start().await;
    let app = app(&server);

    for _ in 0..20 {
        let response = send(&app, post_translate("198.51.100.7", json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = send(&app, post_translate("198.51.100.7", json!({}))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    let body = json_body(response).await;
    assert_eq!(body["retry_after"], 60);
    assert_eq!(body["current_usage"], 21);
    assert_eq!(body["limit"], 20);

    // another client is unaffected
    let response = send(&app, post_translate("198.51.100.8", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_local_clients_get_higher_limit() {
    let server = MockServer::start().await;
    let app = app(&server);

    for _ in 0..30 {
        let response = send(&app, post_translate("127.0.0.1", json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = send(&app, post_translate("127.0.0.1", json!({}))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["limit"], 30);
}

#[tokio::test]
async fn test_limit_resets_after_window() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(200).set_body_json(gemini_text("Hola"))).await;
    let app = app_with(&server, &["--rate-limit", "1", "--rate-window", "1"]);

    let first = send(&app, post_translate("198.51.100.9", valid_body())).await;
    assert_eq!(first.status(), StatusCode::OK);

    let limited = send(&app, post_translate("198.51.100.9", valid_body())).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let again = send(&app, post_translate("198.51.100.9", valid_body())).await;
    assert_eq!(again.status(), StatusCode::OK);
}

// ==================== Prometheus ====================

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    let server = MockServer::start().await;
    mount_gemini(&server, ResponseTemplate::new(200).set_body_json(gemini_text("Hola"))).await;
    let app = app(&server);

    send(&app, post_translate("203.0.113.30", valid_body())).await;

    let response = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("translate_requests_total 1"));
    assert!(text.contains("translate_responses_total{status=\"200\"} 1"));
}

#[tokio::test]
async fn test_refused_requests_do_not_reach_prometheus() {
    let server = MockServer::start().await;
    let app = app_with(&server, &["--rate-limit", "1"]);

    // one validation failure, then one rate-limited request
    let response = send(&app, post_translate("203.0.113.31", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = send(&app, post_translate("203.0.113.31", json!({}))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = send(&app, Request::get("/metrics").body(Body::empty()).unwrap()).await;
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("translate_requests_total 0"));
    assert!(!text.contains("translate_responses_total{"));
}
