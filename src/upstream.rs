use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::UpstreamError;
use crate::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    SafetySetting,
};

const USER_AGENT: &str = concat!("DialectGateway/", env!("CARGO_PKG_VERSION"));

// Fixed generation parameters
const TEMPERATURE: f32 = 0.8;
const MAX_OUTPUT_TOKENS: u32 = 300;
const TOP_P: f32 = 0.95;
const TOP_K: u32 = 40;
const SAFETY_THRESHOLD: &str = "BLOCK_ONLY_HIGH";
const SAFETY_CATEGORIES: [&str; 2] = ["HARM_CATEGORY_HATE_SPEECH", "HARM_CATEGORY_HARASSMENT"];

/// Client for the Gemini `generateContent` endpoint.
///
/// One attempt per call; failures are mapped to [`UpstreamError`] and
/// returned to the caller without retrying.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Rephrase `text` in the style described by `dialect`.
    pub async fn translate(&self, dialect: &str, text: &str) -> Result<String, UpstreamError> {
        let request = build_request(dialect, text);

        debug!(model = %self.model, prompt_chars = dialect.len() + text.len(), "calling gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), error = %body, "gemini API error");
            return Err(map_status(status));
        }

        let body: GenerateContentResponse = response.json().await?;
        interpret_response(body)
    }
}

pub fn build_prompt(dialect: &str, text: &str) -> String {
    format!("{}: \"{}\"", dialect, text)
}

pub fn build_request(dialect: &str, text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(build_prompt(dialect, text)),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            top_p: TOP_P,
            top_k: TOP_K,
        },
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|category| SafetySetting {
                category: category.to_string(),
                threshold: SAFETY_THRESHOLD.to_string(),
            })
            .collect(),
    }
}

fn map_status(status: StatusCode) -> UpstreamError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::Overloaded,
        StatusCode::FORBIDDEN => UpstreamError::Forbidden,
        other => UpstreamError::Status(other.as_u16()),
    }
}

fn interpret_response(body: GenerateContentResponse) -> Result<String, UpstreamError> {
    if body.first_finish_reason() == Some("SAFETY") {
        info!("content safety block");
        return Err(UpstreamError::SafetyBlocked {
            reason: "SAFETY".to_string(),
        });
    }

    if let Some(reason) = body
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        info!(block_reason = reason, "prompt blocked");
        return Err(UpstreamError::SafetyBlocked {
            reason: reason.to_string(),
        });
    }

    match body.first_text().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(UpstreamError::EmptyResult),
    }
}
