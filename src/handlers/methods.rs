use axum::{
    Json,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;

pub const ALLOWED_METHODS: [&str; 3] = ["POST", "GET", "OPTIONS"];

// CORS preflight, headers come from the router layers
pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, ALLOWED_METHODS.join(", "))],
        Json(json!({
            "error": "Method not allowed",
            "allowed_methods": ALLOWED_METHODS,
        })),
    )
}
