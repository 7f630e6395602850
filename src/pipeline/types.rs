//! Shared types for the email and chatbot processors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::{Entity, SentimentLabel};

// ── Email ───────────────────────────────────────────────────────────

/// One email in a thread passed to follow-up suggestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailMessage {
    pub sender: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
}

impl EmailMessage {
    /// Email with all fields set.
    pub fn new(sender: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            subject: Some(subject.into()),
            body: body.into(),
        }
    }
}

// ── Chatbot intent ──────────────────────────────────────────────────

/// What the user is trying to do with a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Question,
    Request,
    Complaint,
    Feedback,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Question => "question",
            Self::Request => "request",
            Self::Complaint => "complaint",
            Self::Feedback => "feedback",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of rule-based intent detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: Intent,
    /// Fixed per rule, in (0, 1].
    pub confidence: f32,
    pub entities: Vec<Entity>,
}

// ── Conversation analysis ───────────────────────────────────────────

/// Estimated user satisfaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Satisfaction {
    High,
    Medium,
    Low,
}

impl Satisfaction {
    /// Parse `high`/`medium`/`low`, ignoring case.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Model-produced insights about a finished conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationAnalysis {
    pub topics: Vec<String>,
    pub sentiment: SentimentLabel,
    pub action_items: Vec<String>,
    pub satisfaction: Satisfaction,
}
