//! High-level Gemini client: prompt helpers over an `LlmProvider`.
//!
//! Holds the default sampling parameters and keeps running token totals
//! so a batch run can report what it spent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::GenerationConfig;
use crate::error::LlmError;
use crate::llm::json::extract_json_object;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::text::SentimentLabel;

/// Per-call overrides of the default sampling parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOverrides {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
}

/// Accumulated usage for this client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Estimated cost in USD.
    pub cost: Decimal,
}

/// Sentiment as judged by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiSentiment {
    pub sentiment: SentimentLabel,
    pub confidence: f32,
    pub tone: String,
}

#[derive(Debug, Deserialize)]
struct RawSentiment {
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    tone: String,
}

/// Gemini API wrapper used by the email and chatbot processors.
pub struct GeminiClient {
    llm: Arc<dyn LlmProvider>,
    defaults: GenerationConfig,
    requests: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl GeminiClient {
    pub fn new(llm: Arc<dyn LlmProvider>, defaults: GenerationConfig) -> Self {
        Self {
            llm,
            defaults,
            requests: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Generate text for a prompt with the default sampling parameters.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_text_with(prompt, GenerationOverrides::default())
            .await
    }

    /// Generate text for a prompt, overriding selected sampling parameters.
    pub async fn generate_text_with(
        &self,
        prompt: &str,
        overrides: GenerationOverrides,
    ) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::InvalidRequest("prompt is empty".into()));
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(overrides.temperature.unwrap_or(self.defaults.temperature))
            .with_top_p(overrides.top_p.unwrap_or(self.defaults.top_p))
            .with_top_k(overrides.top_k.unwrap_or(self.defaults.top_k))
            .with_max_tokens(overrides.max_tokens.unwrap_or(self.defaults.max_tokens));

        let response = self.llm.complete(request).await.map_err(|e| {
            error!(model = self.llm.model_name(), error = %e, "Text generation failed");
            e
        })?;

        self.requests.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(u64::from(response.input_tokens), Ordering::Relaxed);
        self.output_tokens
            .fetch_add(u64::from(response.output_tokens), Ordering::Relaxed);

        if response.finish_reason == FinishReason::Length {
            warn!(
                max_tokens = overrides.max_tokens.unwrap_or(self.defaults.max_tokens),
                "Completion truncated at token limit"
            );
        }
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Generation complete"
        );

        Ok(response.content.trim().to_string())
    }

    /// Ask the model for sentiment, confidence, and tone of a text.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<ApiSentiment, LlmError> {
        let prompt = format!(
            "Analyze the sentiment of the following text and return ONLY a JSON object with:\n\
             - \"sentiment\": positive, negative, or neutral\n\
             - \"confidence\": a number between 0 and 1\n\
             - \"tone\": formal, informal, friendly, urgent, etc.\n\n\
             Text: {text}"
        );

        let raw = self
            .generate_text_with(
                &prompt,
                GenerationOverrides {
                    temperature: Some(0.0),
                    ..Default::default()
                },
            )
            .await?;
        parse_sentiment(&raw)
    }

    /// Draft a professional reply to an email, with optional extra context.
    pub async fn generate_email_reply(
        &self,
        email_content: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> Result<String, LlmError> {
        let mut prompt = format!(
            "Generate a professional email reply to the following email:\n\n{email_content}"
        );
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            prompt.push_str("\n\nAdditional context:\n");
            for (key, value) in context {
                prompt.push_str(&format!("- {key}: {value}\n"));
            }
        }
        self.generate_text(&prompt).await
    }

    /// Respond to a chat message given prior turns.
    pub async fn generate_chatbot_response(
        &self,
        user_input: &str,
        history: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let prompt = format!(
            "You are an AI assistant for business communication. \
             Respond to the following user message:\n\n{}User: {user_input}\nAssistant:",
            render_history(history)
        );
        self.generate_text(&prompt).await
    }

    /// Summarize a business report into insights, trends, and action items.
    pub async fn summarize_business_report(&self, report_text: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Summarize the following business report, highlighting key insights, \
             trends, and action items:\n\n{report_text}"
        );
        self.generate_text(&prompt).await
    }

    /// Usage accumulated across all successful calls.
    pub fn usage(&self) -> UsageTotals {
        let input_tokens = self.input_tokens.load(Ordering::Relaxed);
        let output_tokens = self.output_tokens.load(Ordering::Relaxed);
        let (input_rate, output_rate) = self.llm.cost_per_token();
        UsageTotals {
            requests: self.requests.load(Ordering::Relaxed),
            input_tokens,
            output_tokens,
            cost: input_rate * Decimal::from(input_tokens)
                + output_rate * Decimal::from(output_tokens),
        }
    }
}

/// Render conversation turns as `role: content` lines.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}\n", m.role.as_str(), m.content))
        .collect()
}

fn parse_sentiment(raw: &str) -> Result<ApiSentiment, LlmError> {
    let parsed: RawSentiment = serde_json::from_str(&extract_json_object(raw))?;
    let sentiment = SentimentLabel::from_label(&parsed.sentiment).unwrap_or_else(|| {
        warn!(label = %parsed.sentiment, "Unknown sentiment label from model, using neutral");
        SentimentLabel::Neutral
    });
    Ok(ApiSentiment {
        sentiment,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        tone: parsed.tone,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::llm::provider::CompletionResponse;

    /// Mock provider returning canned responses in order (last one repeats)
    /// and recording every request.
    pub(crate) struct ScriptedLlm {
        responses: Mutex<Vec<Result<String, String>>>,
        pub(crate) requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub(crate) fn replying(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(reason: &str) -> Self {
            Self {
                responses: Mutex::new(vec![Err(reason.to_string())]),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.messages.last().map(|m| m.content.clone()).unwrap_or_default())
                .collect()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (dec!(0.001), dec!(0.002))
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            match next {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    input_tokens: 10,
                    output_tokens: 5,
                    finish_reason: FinishReason::Stop,
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason,
                }),
            }
        }
    }

    fn client(llm: Arc<ScriptedLlm>) -> GeminiClient {
        GeminiClient::new(llm, GenerationConfig::default())
    }

    #[tokio::test]
    async fn generate_text_applies_defaults_and_trims() {
        let llm = Arc::new(ScriptedLlm::replying(&["  Hello!  \n"]));
        let client = client(llm.clone());

        let text = client.generate_text("Say hello").await.unwrap();
        assert_eq!(text, "Hello!");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, Some(0.2));
        assert_eq!(requests[0].top_p, Some(0.95));
        assert_eq!(requests[0].top_k, Some(40));
        assert_eq!(requests[0].max_tokens, Some(1024));
    }

    #[tokio::test]
    async fn overrides_replace_defaults() {
        let llm = Arc::new(ScriptedLlm::replying(&["ok"]));
        let client = client(llm.clone());
        client
            .generate_text_with(
                "x",
                GenerationOverrides {
                    temperature: Some(0.9),
                    max_tokens: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, Some(0.9));
        assert_eq!(requests[0].max_tokens, Some(50));
        assert_eq!(requests[0].top_k, Some(40));
    }

    #[tokio::test]
    async fn empty_prompt_rejected_without_call() {
        let llm = Arc::new(ScriptedLlm::replying(&["never"]));
        let client = client(llm.clone());
        assert!(matches!(
            client.generate_text("   ").await,
            Err(LlmError::InvalidRequest(_))
        ));
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn usage_accumulates_tokens_and_cost() {
        let llm = Arc::new(ScriptedLlm::replying(&["a", "b"]));
        let client = client(llm);
        client.generate_text("one").await.unwrap();
        client.generate_text("two").await.unwrap();

        let usage = client.usage();
        assert_eq!(usage.requests, 2);
        assert_eq!(usage.input_tokens, 20);
        assert_eq!(usage.output_tokens, 10);
        assert_eq!(usage.cost, dec!(0.040));
    }

    #[tokio::test]
    async fn failed_call_not_counted() {
        let client = client(Arc::new(ScriptedLlm::failing("boom")));
        assert!(client.generate_text("x").await.is_err());
        assert_eq!(client.usage().requests, 0);
    }

    #[tokio::test]
    async fn analyze_sentiment_parses_model_json() {
        let llm = Arc::new(ScriptedLlm::replying(&[
            "```json\n{\"sentiment\": \"Negative\", \"confidence\": 1.4, \"tone\": \"urgent\"}\n```",
        ]));
        let client = client(llm.clone());
        let result = client.analyze_sentiment("This is unacceptable").await.unwrap();
        assert_eq!(result.sentiment, SentimentLabel::Negative);
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(result.tone, "urgent");
        assert_eq!(llm.requests.lock().unwrap()[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn analyze_sentiment_rejects_non_json() {
        let client = client(Arc::new(ScriptedLlm::replying(&["I think it's positive"])));
        assert!(matches!(
            client.analyze_sentiment("great").await,
            Err(LlmError::Json(_))
        ));
    }

    #[test]
    fn unknown_sentiment_label_defaults_to_neutral() {
        let parsed = parse_sentiment(r#"{"sentiment": "mixed", "confidence": 0.5}"#).unwrap();
        assert_eq!(parsed.sentiment, SentimentLabel::Neutral);
        assert!(parsed.tone.is_empty());
    }

    #[tokio::test]
    async fn email_reply_prompt_includes_context() {
        let llm = Arc::new(ScriptedLlm::replying(&["Dear Sam, ..."]));
        let client = client(llm.clone());
        let mut context = BTreeMap::new();
        context.insert("account".to_string(), "Enterprise".to_string());
        client
            .generate_email_reply("Where is my invoice?", Some(&context))
            .await
            .unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Where is my invoice?"));
        assert!(prompt.contains("- account: Enterprise"));
    }

    #[tokio::test]
    async fn chatbot_prompt_renders_history() {
        let llm = Arc::new(ScriptedLlm::replying(&["Sure."]));
        let client = client(llm.clone());
        let history = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello, how can I help?"),
        ];
        client
            .generate_chatbot_response("Book a demo", &history)
            .await
            .unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("user: Hi\nassistant: Hello, how can I help?\n"));
        assert!(prompt.ends_with("User: Book a demo\nAssistant:"));
    }

    #[tokio::test]
    async fn summarize_report_wraps_text() {
        let llm = Arc::new(ScriptedLlm::replying(&["Revenue up."]));
        let client = client(llm.clone());
        let summary = client
            .summarize_business_report("Q3 revenue grew 12%.")
            .await
            .unwrap();
        assert_eq!(summary, "Revenue up.");
        assert!(llm.prompts()[0].contains("Q3 revenue grew 12%."));
    }
}
