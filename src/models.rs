use serde::{Deserialize, Serialize};
use serde_json::Value;

// Incoming POST body. Fields stay untyped so non-string values
// can be rejected the same way as missing ones.
#[derive(Debug, Default, Deserialize)]
pub struct TranslationRequest {
    #[serde(default)]
    pub dialect: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
}

// Falsy JSON values count as missing
pub fn is_present(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

// Character length of string values; other values have no length
pub fn char_len(value: &Option<Value>) -> Option<usize> {
    match value {
        Some(Value::String(s)) => Some(s.chars().count()),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translation: String,
    pub metadata: TranslationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationMetadata {
    pub request_id: String,
    pub dialect: String,
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub service_version: String,
    pub region: String,
}

// Gemini generateContent request format
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

#[derive(Debug, Serialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

// Gemini generateContent response format (only the fields we read)
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }

    pub fn first_finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presence_rules() {
        assert!(!is_present(&None));
        assert!(!is_present(&Some(json!(null))));
        assert!(!is_present(&Some(json!(""))));
        assert!(!is_present(&Some(json!(false))));
        assert!(!is_present(&Some(json!(0))));
        assert!(is_present(&Some(json!("hi"))));
        assert!(is_present(&Some(json!(5))));
        assert!(is_present(&Some(json!({"a": 1}))));
    }

    #[test]
    fn test_char_len_counts_chars() {
        assert_eq!(char_len(&Some(json!("año"))), Some(3));
        assert_eq!(char_len(&Some(json!(12))), None);
        assert_eq!(char_len(&None), None);
    }

    #[test]
    fn test_request_missing_fields_deserialize() {
        let req: TranslationRequest = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert!(req.dialect.is_none());
        assert_eq!(req.text, Some(json!("hi")));
    }

    #[test]
    fn test_generate_request_wire_format() {
        let req = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some("prompt".to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.8,
                max_output_tokens: 300,
                top_p: 0.95,
                top_k: 40,
            },
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_HARASSMENT".to_string(),
                threshold: "BLOCK_ONLY_HIGH".to_string(),
            }],
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 300);
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert_eq!(value["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn test_response_accessors() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hola"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(resp.first_text(), Some("Hola"));
        assert_eq!(resp.first_finish_reason(), Some("STOP"));
    }

    #[test]
    fn test_response_accessors_on_empty_body() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(resp.first_text(), None);
        assert_eq!(resp.first_finish_reason(), None);
        assert!(resp.prompt_feedback.is_none());
    }
}
