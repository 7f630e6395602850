//! Email automation: categorize, draft replies, suggest follow-ups.
//!
//! Flow per email:
//! 1. Ask the model for a category, falling back to keyword rules
//! 2. Annotate the body locally (sentiment, entities)
//! 3. Ask the model for a reply with that context

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_EMAIL_CATEGORIES;
use crate::data::Table;
use crate::error::PipelineError;
use crate::llm::GeminiClient;
use crate::pipeline::rules::CategoryRules;
use crate::pipeline::types::EmailMessage;
use crate::text::{Sentiment, TextPreprocessor};

/// Entities listed in the reply prompt.
const MAX_PROMPT_ENTITIES: usize = 5;

pub const PREDICTED_CATEGORY_COLUMN: &str = "Predicted_Category";
pub const GENERATED_REPLY_COLUMN: &str = "Generated_Reply";

/// Email automation over the Gemini client.
pub struct EmailAutomation {
    client: Arc<GeminiClient>,
    text: TextPreprocessor,
    categories: Vec<String>,
    rules: CategoryRules,
}

impl EmailAutomation {
    /// An empty category list falls back to the defaults.
    pub fn new(client: Arc<GeminiClient>, categories: Vec<String>) -> Self {
        let categories = if categories.is_empty() {
            DEFAULT_EMAIL_CATEGORIES.iter().map(|c| c.to_string()).collect()
        } else {
            categories
        };
        info!(categories = ?categories, "Email automation ready");
        Self {
            client,
            text: TextPreprocessor::new(),
            categories,
            rules: CategoryRules::default_rules(),
        }
    }

    pub fn with_rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Categorize an email. Always returns one of the configured categories.
    pub async fn categorize_email(&self, subject: &str, body: &str) -> String {
        let prompt = format!(
            "Categorize the following email into one of these categories: {}\n\n\
             Subject: {subject}\n\
             Body: {body}\n\n\
             Return only the category name.",
            self.categories.join(", ")
        );

        match self.client.generate_text(&prompt).await {
            Ok(answer) => {
                if let Some(category) = self.match_category(&answer) {
                    debug!(category = %category, "Model categorized email");
                    return category;
                }
                let fallback = self.rule_category(subject, body);
                warn!(
                    answer = %answer,
                    fallback = %fallback,
                    "Category not recognized, using fallback"
                );
                fallback
            }
            Err(e) => {
                let fallback = self.rule_category(subject, body);
                error!(error = %e, fallback = %fallback, "Error categorizing email");
                fallback
            }
        }
    }

    /// Draft a professional reply. Categorizes first when `category` is `None`.
    pub async fn generate_reply(
        &self,
        subject: &str,
        body: &str,
        sender: &str,
        category: Option<&str>,
    ) -> Result<String, PipelineError> {
        let category = match category.filter(|c| !c.trim().is_empty()) {
            Some(c) => c.to_string(),
            None => self.categorize_email(subject, body).await,
        };

        let sentiment = self.text.analyze_sentiment(body);
        let entities = self
            .text
            .extract_entities(body)
            .into_iter()
            .take(MAX_PROMPT_ENTITIES)
            .map(|e| format!("{} ({})", e.text, e.label))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "Generate a professional email reply to the following email:\n\n\
             From: {sender}\n\
             Subject: {subject}\n\
             Body: {body}\n\n\
             Additional information:\n\
             - Email category: {category}\n\
             - Sentiment: {sentiment}\n\
             - Key entities: {entities}\n\n\
             The reply should be professional, concise, and address the specific points in the email.\n\
             If the email is a question, provide a helpful answer.\n\
             If the email is a request, acknowledge it and provide next steps.",
            sentiment = sentiment.label,
        );

        let reply = self.client.generate_text(&prompt).await.map_err(|e| {
            error!(error = %e, sender, "Error generating email reply");
            e
        })?;
        Ok(reply)
    }

    /// Suggest the next email in a thread.
    pub async fn suggest_follow_up(&self, thread: &[EmailMessage]) -> Result<String, PipelineError> {
        if thread.is_empty() {
            return Err(PipelineError::Reply("email thread is empty".into()));
        }

        let mut thread_text = String::new();
        for (i, email) in thread.iter().enumerate() {
            thread_text.push_str(&format!(
                "Email {}:\nFrom: {}\nSubject: {}\nBody: {}\n\n",
                i + 1,
                email.sender.as_deref().unwrap_or("Unknown"),
                email.subject.as_deref().unwrap_or("No Subject"),
                email.body,
            ));
        }

        let prompt = format!(
            "Based on the following email thread, suggest a follow-up email:\n\n\
             {thread_text}\
             The follow-up should be professional, concise, and move the conversation forward."
        );

        let follow_up = self.client.generate_text(&prompt).await.map_err(|e| {
            error!(error = %e, "Error suggesting follow-up");
            e
        })?;
        Ok(follow_up)
    }

    /// Local lexicon sentiment of an email body. No API call.
    pub fn analyze_email_sentiment(&self, body: &str) -> Sentiment {
        self.text.analyze_sentiment(body)
    }

    /// Categorize and draft a reply for every row.
    ///
    /// Returns a copy of `table` with `Predicted_Category` and
    /// `Generated_Reply` added. A failed reply is written as an error
    /// message in its cell and the batch carries on.
    pub async fn batch_process_emails(&self, table: &Table) -> crate::error::Result<Table> {
        let mut result = table.clone();
        result.add_column(PREDICTED_CATEGORY_COLUMN, "");
        result.add_column(GENERATED_REPLY_COLUMN, "");

        let total = result.len();
        info!(count = total, "Processing email batch");

        let mut failed = 0;
        for row in 0..total {
            let subject = table.get(row, "Subject").unwrap_or_default().to_string();
            let body = table.get(row, "Email_Body").unwrap_or_default().to_string();
            let sender = table.get(row, "Sender").unwrap_or_default().to_string();

            let category = self.categorize_email(&subject, &body).await;
            result.set(row, PREDICTED_CATEGORY_COLUMN, category.as_str())?;

            let reply = match self
                .generate_reply(&subject, &body, &sender, Some(&category))
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    failed += 1;
                    format!("Error generating reply: {e}")
                }
            };
            result.set(row, GENERATED_REPLY_COLUMN, reply)?;

            info!("Processed email {}/{}", row + 1, total);
        }

        info!(total, failed, "Email batch complete");
        Ok(result)
    }

    fn match_category(&self, answer: &str) -> Option<String> {
        let cleaned = answer.trim().trim_matches(|c: char| !c.is_alphanumeric());
        self.categories
            .iter()
            .find(|c| c.eq_ignore_ascii_case(cleaned))
            .cloned()
    }

    fn rule_category(&self, subject: &str, body: &str) -> String {
        self.rules
            .evaluate(subject, body, &self.categories)
            .unwrap_or_else(|| self.categories[0].clone())
    }
}
