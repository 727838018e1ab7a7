use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::rate_limit::RateDecision;
use crate::sanitize::MAX_INPUT_CHARS;

pub const MAX_DIALECT_CHARS: usize = 500;

// Seconds a client should wait when Gemini itself is overloaded
pub const UPSTREAM_RETRY_AFTER: u64 = 30;

const UPSTREAM_SERVICE: &str = "gemini";
const SERVICE_NAME: &str = "translation-api";

/// Failures talking to the generative-language service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limited the request")]
    Overloaded,

    #[error("upstream rejected credentials")]
    Forbidden,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("content blocked by safety filter ({reason})")]
    SafetyBlocked { reason: String },

    #[error("upstream returned an empty result")]
    EmptyResult,

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Every way a translate request can fail, with its client-facing rendering.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not valid JSON")]
    InvalidBody { request_id: String },

    #[error("missing dialect or text")]
    MissingFields { request_id: String },

    #[error("text too long ({length} chars)")]
    TextTooLong { length: usize },

    #[error("dialect too long ({length} chars)")]
    DialectTooLong { length: usize },

    #[error("input empty after sanitization")]
    EmptyAfterSanitize { request_id: String },

    #[error("rate limited ({decision:?})")]
    RateLimited { decision: RateDecision },

    #[error("{source}")]
    Upstream {
        #[source]
        source: UpstreamError,
        request_id: String,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody { .. }
            | ApiError::MissingFields { .. }
            | ApiError::TextTooLong { .. }
            | ApiError::DialectTooLong { .. }
            | ApiError::EmptyAfterSanitize { .. } => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { source, .. } => match source {
                UpstreamError::Overloaded => StatusCode::TOO_MANY_REQUESTS,
                UpstreamError::Forbidden => StatusCode::SERVICE_UNAVAILABLE,
                UpstreamError::Status(_) => StatusCode::BAD_GATEWAY,
                UpstreamError::SafetyBlocked { .. } => StatusCode::BAD_REQUEST,
                UpstreamError::EmptyResult | UpstreamError::Transport(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    // Only failures after the upstream call count against the error tally
    pub fn is_upstream(&self) -> bool {
        matches!(self, ApiError::Upstream { .. })
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::InvalidBody { request_id } => json!({
                "error": "Request body must be a JSON object with dialect and text",
                "request_id": request_id,
            }),
            ApiError::MissingFields { request_id } => json!({
                "error": "Missing required fields: dialect and text",
                "request_id": request_id,
            }),
            ApiError::TextTooLong { length } => json!({
                "error": format!("Text too long. Maximum {} characters.", MAX_INPUT_CHARS),
                "current_length": length,
                "max_length": MAX_INPUT_CHARS,
            }),
            ApiError::DialectTooLong { length } => json!({
                "error": format!("Dialect description too long. Maximum {} characters.", MAX_DIALECT_CHARS),
                "current_length": length,
                "max_length": MAX_DIALECT_CHARS,
            }),
            ApiError::EmptyAfterSanitize { request_id } => json!({
                "error": "Invalid input after sanitization",
                "request_id": request_id,
            }),
            ApiError::RateLimited { decision } => json!({
                "error": format!(
                    "Translation limit reached. Please wait {} seconds.",
                    decision.retry_after
                ),
                "retry_after": decision.retry_after,
                "current_usage": decision.current_usage,
                "limit": decision.limit,
            }),
            ApiError::Upstream { source, request_id } => match source {
                UpstreamError::Overloaded => json!({
                    "error": format!(
                        "Translation service overloaded. Please try again in {} seconds.",
                        UPSTREAM_RETRY_AFTER
                    ),
                    "service": UPSTREAM_SERVICE,
                    "retry_after": UPSTREAM_RETRY_AFTER,
                    "request_id": request_id,
                }),
                UpstreamError::Forbidden => json!({
                    "error": "Translation service temporarily unavailable.",
                    "service": UPSTREAM_SERVICE,
                    "request_id": request_id,
                }),
                UpstreamError::Status(status) => json!({
                    "error": "Translation service error",
                    "service": UPSTREAM_SERVICE,
                    "status": status,
                    "request_id": request_id,
                }),
                UpstreamError::SafetyBlocked { .. } => json!({
                    "error": "Content could not be translated due to safety policies. Please try different text.",
                    "reason": "safety_filter",
                    "request_id": request_id,
                }),
                UpstreamError::EmptyResult => json!({
                    "error": "Translation service returned empty result. Please try again.",
                    "request_id": request_id,
                }),
                UpstreamError::Transport(_) => json!({
                    "error": "Internal server error. Please try again.",
                    "request_id": request_id,
                    "service": SERVICE_NAME,
                }),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        let headers = response.headers_mut();

        match &self {
            ApiError::RateLimited { decision } => {
                let reset = chrono::Utc::now().timestamp() + decision.retry_after as i64;
                headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
                headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
            }
            ApiError::Upstream {
                source: UpstreamError::Overloaded,
                ..
            } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(UPSTREAM_RETRY_AFTER));
            }
            _ => {}
        }

        response
    }
}
