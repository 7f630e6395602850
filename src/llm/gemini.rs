//! Gemini `generateContent` REST provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER: &str = "gemini";

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini provider talking to the public REST API.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a provider. `base_url` is the API root, e.g.
    /// `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_request_body(&request);
        debug!(model = %self.model, messages = request.messages.len(), "Sending Gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(?retry_after, "Gemini rate limit hit");
            return Err(LlmError::RateLimited {
                provider: PROVIDER.into(),
                retry_after,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.into(),
            });
        }

        let text = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.into(),
            reason: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("HTTP {status}: {}", text.chars().take(500).collect::<String>()),
            });
        }

        parse_response(&text)
    }
}

/// Approximate list prices (USD per token) by model family.
fn model_cost(model: &str) -> (Decimal, Decimal) {
    if model.contains("flash") {
        (dec!(0.0000001), dec!(0.0000004))
    } else if model.contains("pro") {
        (dec!(0.00000125), dec!(0.00001))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Map a provider-agnostic request onto the Gemini request body.
///
/// System messages are merged into `systemInstruction`; assistant turns
/// use Gemini's `model` role.
fn build_request_body(request: &CompletionRequest) -> GenerateContentRequest<'_> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        match message.role {
            Role::System => system_parts.push(Part {
                text: &message.content,
            }),
            Role::User => contents.push(Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &message.content,
                }],
            }),
            Role::Assistant => contents.push(Content {
                role: Some("model"),
                parts: vec![Part {
                    text: &message.content,
                }],
            }),
        }
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: system_parts,
        })
    };

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: WireGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            max_output_tokens: request.max_tokens,
        },
    }
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
            FinishReason::Safety
        }
        Some(_) => FinishReason::Other,
    }
}

/// Parse a successful `generateContent` body.
fn parse_response(body: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: format!("unparseable body: {e}"),
        })?;

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = parsed
        .candidates
        .first()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: "no candidates returned".into(),
        })?;

    let finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
    let content: String = candidate
        .content
        .as_ref()
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: format!("empty completion (finish reason: {finish_reason:?})"),
        });
    }

    let usage = parsed.usage_metadata.unwrap_or_default();
    Ok(CompletionResponse {
        content,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[test]
    fn request_body_splits_system_and_maps_roles() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi"),
            ChatMessage::user("Status?"),
        ])
        .with_temperature(0.2)
        .with_top_p(0.95)
        .with_top_k(40)
        .with_max_tokens(1024);

        let json = serde_json::to_value(build_request_body(&request)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be terse.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "Status?");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn request_body_omits_unset_sampling() {
        let request = CompletionRequest::new(vec![ChatMessage::user("x")]);
        let json = serde_json::to_value(build_request_body(&request)).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["generationConfig"], serde_json::json!({}));
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15}
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.content, "Hello there");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 3);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn max_tokens_maps_to_length() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "cut"}]}, "finishReason": "MAX_TOKENS"}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.input_tokens, 0);
    }

    #[test]
    fn blocked_prompt_is_invalid_response() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("prompt blocked"));
    }

    #[test]
    fn missing_candidates_is_invalid_response() {
        assert!(matches!(
            parse_response("{}"),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn empty_text_is_invalid_response() {
        let body = r#"{"candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("Safety"));
    }

    #[test]
    fn garbage_body_is_invalid_response() {
        assert!(matches!(
            parse_response("<html>oops</html>"),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let provider = GeminiProvider::new(
            SecretString::from("k".to_string()),
            "gemini-2.0-flash",
            "http://localhost:9/v1beta/",
        )
        .unwrap();
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(provider.model_name(), "gemini-2.0-flash");
        assert!(provider.cost_per_token().0 > Decimal::ZERO);
    }
}
