//! Lexicon sentiment scoring.

use std::fmt;

use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "positive", "happy", "satisfied"];
const NEGATIVE_WORDS: &[&str] = &["bad", "poor", "negative", "unhappy", "dissatisfied"];

/// Scores above this are positive, below its negation negative.
const LABEL_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Lowercase label as used in prompts and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a label case-insensitively.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment score in [-1, 1] and its label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}

impl Sentiment {
    /// Zero score, neutral label.
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
        }
    }
}

/// Score already-tokenized text: (positive hits − negative hits) / token count.
pub fn score_tokens(tokens: &[String]) -> Sentiment {
    if tokens.is_empty() {
        return Sentiment::neutral();
    }

    let positive = tokens
        .iter()
        .filter(|t| POSITIVE_WORDS.contains(&t.as_str()))
        .count();
    let negative = tokens
        .iter()
        .filter(|t| NEGATIVE_WORDS.contains(&t.as_str()))
        .count();

    let score = (positive as f64 - negative as f64) / tokens.len().max(1) as f64;
    let label = if score > LABEL_THRESHOLD {
        SentimentLabel::Positive
    } else if score < -LABEL_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    Sentiment { score, label }
}
