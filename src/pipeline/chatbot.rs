//! Business chatbot with rolling history.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::data::Table;
use crate::error::PipelineError;
use crate::llm::json::extract_json_object;
use crate::llm::{ChatMessage, GeminiClient, GenerationOverrides, client::render_history};
use crate::pipeline::memory::ConversationMemory;
use crate::pipeline::rules::IntentRules;
use crate::pipeline::types::{ConversationAnalysis, IntentResult, Satisfaction};
use crate::text::{SentimentLabel, TextPreprocessor};

pub const GENERATED_RESPONSE_COLUMN: &str = "Generated_Response";

const RESPONSE_FALLBACK: &str = "I apologize, but I'm having trouble processing your request right now. How else can I assist you?";
const INQUIRY_FALLBACK: &str = "I apologize, but I'm having trouble processing your business inquiry right now. Please try again later or contact our support team for assistance.";

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    satisfaction: String,
}

/// Chatbot over the Gemini client.
pub struct ChatbotProcessor {
    client: Arc<GeminiClient>,
    text: TextPreprocessor,
    intents: IntentRules,
    memory: ConversationMemory,
}

impl ChatbotProcessor {
    /// Create a chatbot keeping at most `max_history` turns.
    pub fn new(client: Arc<GeminiClient>, max_history: usize) -> Self {
        let memory = ConversationMemory::new(max_history);
        info!(session = %memory.session_id(), max_history = memory.max_messages(), "Chatbot ready");
        Self {
            client,
            text: TextPreprocessor::new(),
            intents: IntentRules::default_rules(),
            memory,
        }
    }

    /// Rule-based intent plus entities. No API call.
    pub fn detect_intent(&self, user_input: &str) -> IntentResult {
        let (intent, confidence) = self.intents.evaluate(user_input);
        IntentResult {
            intent,
            confidence,
            entities: self.text.extract_entities(user_input),
        }
    }

    /// Respond to a user message, recording both turns in history.
    ///
    /// On API failure the apology fallback is recorded and returned.
    pub async fn generate_response(&mut self, user_input: &str) -> String {
        self.memory.add(ChatMessage::user(user_input));
        let intent = self.detect_intent(user_input);

        let prompt = format!(
            "You are an AI assistant for business communication. Respond to the following user message:\n\n\
             Conversation history:\n\
             {history}\n\
             User intent: {intent}\n\n\
             Your response should be helpful, concise, and professional. If you don't know the answer, \
             acknowledge that and offer to help with something else.",
            history = render_history(self.memory.messages()),
            intent = intent.intent,
        );

        let response = match self.client.generate_text(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(session = %self.memory.session_id(), error = %e, "Error generating response");
                RESPONSE_FALLBACK.to_string()
            }
        };

        self.memory.add(ChatMessage::assistant(response.as_str()));
        debug!(
            session = %self.memory.session_id(),
            intent = %intent.intent,
            turns = self.memory.len(),
            "Chat turn complete"
        );
        response
    }

    /// Forget the conversation and start a new session.
    pub fn clear_history(&mut self) {
        self.memory.clear();
        info!(session = %self.memory.session_id(), "Conversation history cleared");
    }

    /// Turns in the current session, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        self.memory.messages()
    }

    /// Answer a business inquiry with optional key/value context.
    pub async fn handle_business_inquiry(
        &self,
        inquiry: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> String {
        let mut context_text = String::new();
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            context_text.push_str("Business context:\n");
            for (key, value) in context {
                context_text.push_str(&format!("- {key}: {value}\n"));
            }
        }

        let prompt = format!(
            "You are a business assistant. Respond to the following business inquiry with accurate information:\n\n\
             Inquiry: {inquiry}\n\n\
             {context_text}\n\
             Your response should be professional, informative, and actionable."
        );

        match self.client.generate_text(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Error handling business inquiry");
                INQUIRY_FALLBACK.to_string()
            }
        }
    }

    /// Ask the model for topics, sentiment, action items, and satisfaction.
    pub async fn analyze_conversation(
        &self,
        conversation: &[ChatMessage],
    ) -> Result<ConversationAnalysis, PipelineError> {
        if conversation.is_empty() {
            return Err(PipelineError::Analysis("conversation is empty".into()));
        }

        let prompt = format!(
            "Analyze the following conversation between a user and an AI assistant.\n\
             Identify key topics, sentiment, and potential action items.\n\n\
             Conversation:\n\
             {}\n\
             Return ONLY a JSON object with the following fields:\n\
             - topics: list of main topics discussed\n\
             - sentiment: overall sentiment (positive, negative, neutral)\n\
             - action_items: list of potential action items\n\
             - satisfaction: estimated user satisfaction (high, medium, low)",
            render_history(conversation)
        );

        let raw = self
            .client
            .generate_text_with(
                &prompt,
                GenerationOverrides {
                    temperature: Some(0.0),
                    ..Default::default()
                },
            )
            .await?;
        parse_analysis(&raw)
    }

    /// Respond to each row's `User_Input` as a fresh conversation.
    ///
    /// Returns a copy of `table` with `Generated_Response` added.
    pub async fn batch_process_conversations(&mut self, table: &Table) -> crate::error::Result<Table> {
        let mut result = table.clone();
        result.add_column(GENERATED_RESPONSE_COLUMN, "");

        let total = result.len();
        info!(count = total, "Processing conversation batch");

        for row in 0..total {
            let user_input = table.get(row, "User_Input").unwrap_or_default().to_string();
            self.clear_history();
            let response = self.generate_response(&user_input).await;
            result.set(row, GENERATED_RESPONSE_COLUMN, response)?;
            info!("Processed conversation {}/{}", row + 1, total);
        }

        Ok(result)
    }

    /// Line-oriented chat loop. `/clear`, `/history`, and `/quit` are
    /// handled locally; end of input also quits.
    pub async fn run_interactive<R, W>(&mut self, reader: R, mut writer: W) -> Result<(), PipelineError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        writer
            .write_all(b"Business assistant ready. Commands: /clear, /history, /quit\n")
            .await?;

        loop {
            writer.write_all(b"You: ").await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();
            match input {
                "" => continue,
                "/quit" | "/exit" => break,
                "/clear" => {
                    self.clear_history();
                    writer.write_all(b"History cleared.\n").await?;
                }
                "/history" => {
                    let rendered = render_history(self.history());
                    if rendered.is_empty() {
                        writer.write_all(b"(no history)\n").await?;
                    } else {
                        writer.write_all(rendered.as_bytes()).await?;
                    }
                }
                _ => {
                    let response = self.generate_response(input).await;
                    writer
                        .write_all(format!("Assistant: {response}\n").as_bytes())
                        .await?;
                }
            }
        }

        writer.write_all(b"Goodbye.\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

fn parse_analysis(raw: &str) -> Result<ConversationAnalysis, PipelineError> {
    let parsed: RawAnalysis = serde_json::from_str(&extract_json_object(raw))
        .map_err(|e| PipelineError::Analysis(format!("{e}: {raw}")))?;

    let sentiment = SentimentLabel::from_label(&parsed.sentiment).unwrap_or_else(|| {
        warn!(label = %parsed.sentiment, "Unknown sentiment in analysis, using neutral");
        SentimentLabel::Neutral
    });
    let satisfaction = Satisfaction::from_label(&parsed.satisfaction).unwrap_or_else(|| {
        warn!(label = %parsed.satisfaction, "Unknown satisfaction in analysis, using medium");
        Satisfaction::Medium
    });

    Ok(ConversationAnalysis {
        topics: parsed.topics,
        sentiment,
        action_items: parsed.action_items,
        satisfaction,
    })
}
