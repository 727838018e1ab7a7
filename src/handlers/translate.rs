use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::error::{ApiError, MAX_DIALECT_CHARS, UpstreamError};
use crate::fingerprint::{Region, client_ip, detect_region, request_fingerprint, user_agent};
use crate::models::{
    TranslationMetadata, TranslationRequest, TranslationResponse, char_len, is_present,
};
use crate::rate_limit::RateDecision;
use crate::sanitize::{MAX_INPUT_CHARS, sanitize_input};
use crate::state::AppState;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Reported with every translation; the upstream gives no real score
const CONFIDENCE: f64 = 94.7;

// Generous cap on raw body size; field limits are checked after parsing
const MAX_BODY_BYTES: usize = 64 * 1024;

/// `POST` - rephrase `text` in the requested `dialect`.
pub async fn translate_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let started = Instant::now();
    let _connection = state.analytics.track_connection();

    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let client_ip = client_ip(&parts.headers, peer);
    let request_id = request_fingerprint(&client_ip, &parts.headers);
    let region = detect_region(&parts.headers);

    let decision = state
        .rate_limiter
        .check(&client_ip, user_agent(&parts.headers));

    if decision.limited {
        info!(
            client_ip = %client_ip,
            request_id = %request_id,
            usage = decision.current_usage,
            limit = decision.limit,
            "rate limit exceeded"
        );
        return ApiError::RateLimited { decision }.into_response();
    }

    let mut response = match translate(&state, body, &request_id, &region, started).await {
        Ok(json) => json.into_response(),
        Err(err) => err.into_response(),
    };

    insert_quota_headers(&mut response, &decision);
    response
}

async fn translate(
    state: &AppState,
    body: Body,
    request_id: &str,
    region: &Region,
    started: Instant,
) -> Result<Json<TranslationResponse>, ApiError> {
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::InvalidBody {
            request_id: request_id.to_string(),
        })?;

    let payload: TranslationRequest = if bytes.is_empty() {
        TranslationRequest::default()
    } else {
        serde_json::from_slice(&bytes).map_err(|_| ApiError::InvalidBody {
            request_id: request_id.to_string(),
        })?
    };

    let (dialect, text) = validate(&payload, request_id)?;

    let upstream_started = Instant::now();
    let outcome = state.upstream.translate(&dialect, &text).await;
    let upstream_latency = upstream_started.elapsed();
    state.analytics.observe_upstream(upstream_latency);

    let translation = match outcome {
        Ok(translation) => translation,
        Err(source) => {
            log_upstream_failure(&source, request_id, &dialect, upstream_latency.as_millis());
            let err = ApiError::Upstream {
                source,
                request_id: request_id.to_string(),
            };
            state
                .analytics
                .record_failure(started.elapsed(), err.status().as_u16());
            return Err(err);
        }
    };

    let key = dialect_key(&dialect);
    let elapsed = started.elapsed();
    state.analytics.record_success(&key, &region.country, elapsed);

    info!(
        request_id = %request_id,
        dialect = %key,
        text_length = text.chars().count(),
        response_length = translation.chars().count(),
        latency_ms = elapsed.as_millis() as u64,
        upstream_latency_ms = upstream_latency.as_millis() as u64,
        region = %region.country,
        language = %region.language,
        "translation completed"
    );

    Ok(Json(TranslationResponse {
        translation,
        metadata: TranslationMetadata {
            request_id: request_id.to_string(),
            dialect: key,
            confidence: CONFIDENCE,
            processing_time_ms: elapsed.as_millis() as u64,
            service_version: SERVICE_VERSION.to_string(),
            region: region.country.clone(),
        },
    }))
}

/// Check presence and length limits, then sanitize both fields.
/// Returns `(dialect, text)` ready for the upstream prompt.
pub fn validate(payload: &TranslationRequest, request_id: &str) -> Result<(String, String), ApiError> {
    if !is_present(&payload.dialect) || !is_present(&payload.text) {
        return Err(ApiError::MissingFields {
            request_id: request_id.to_string(),
        });
    }

    if let Some(length) = char_len(&payload.text).filter(|len| *len > MAX_INPUT_CHARS) {
        return Err(ApiError::TextTooLong { length });
    }

    if let Some(length) = char_len(&payload.dialect).filter(|len| *len > MAX_DIALECT_CHARS) {
        return Err(ApiError::DialectTooLong { length });
    }

    let text = sanitize_input(payload.text.as_ref().unwrap_or(&Value::Null));
    let dialect = sanitize_input(payload.dialect.as_ref().unwrap_or(&Value::Null));

    if text.is_empty() || dialect.is_empty() {
        return Err(ApiError::EmptyAfterSanitize {
            request_id: request_id.to_string(),
        });
    }

    Ok((dialect, text))
}

// First three words of the dialect description, used as the analytics key
pub fn dialect_key(dialect: &str) -> String {
    dialect.split(' ').take(3).collect::<Vec<_>>().join(" ")
}

fn insert_quota_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining()));
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
}

fn log_upstream_failure(source: &UpstreamError, request_id: &str, dialect: &str, latency_ms: u128) {
    match source {
        UpstreamError::SafetyBlocked { reason } => {
            let preview: String = dialect.chars().take(50).collect();
            info!(request_id, reason = %reason, dialect = %preview, "content safety block");
        }
        UpstreamError::EmptyResult => {
            error!(request_id, "empty translation result");
        }
        other => {
            error!(request_id, latency_ms = latency_ms as u64, error = %other, "gemini request failed");
        }
    }
}
