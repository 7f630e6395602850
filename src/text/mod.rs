//! Text preprocessing: cleaning, tokenization, stopwords, entities, sentiment.
//!
//! Everything here is local and deterministic; nothing calls the LLM.

pub mod entities;
pub mod sentiment;
pub mod stopwords;

pub use entities::{Entity, EntityLabel, extract_entities};
pub use sentiment::{Sentiment, SentimentLabel};
pub use stopwords::Stopwords;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Output of the full preprocessing pass over one text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessResult {
    pub original: String,
    pub cleaned: String,
    pub tokens: Vec<String>,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
}

impl PreprocessResult {
    fn empty() -> Self {
        Self {
            original: String::new(),
            cleaned: String::new(),
            tokens: Vec::new(),
            entities: Vec::new(),
            sentiment: Sentiment::neutral(),
        }
    }
}

/// Text preprocessor.
#[derive(Debug, Clone, Default)]
pub struct TextPreprocessor {
    stopwords: Stopwords,
}

impl TextPreprocessor {
    /// Preprocessor with the English stopword list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preprocessor with a custom stopword list.
    pub fn with_stopwords(stopwords: Stopwords) -> Self {
        Self { stopwords }
    }

    /// Lowercase, replace punctuation and digit runs with spaces, and
    /// collapse whitespace.
    pub fn clean_text(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let lowered = text.to_lowercase();
        let text = NON_WORD.replace_all(&lowered, " ");
        let text = DIGITS.replace_all(&text, " ");
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }

    /// Clean then split into word tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.clean_text(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Drop stopwords, keeping order.
    pub fn remove_stopwords(&self, tokens: Vec<String>) -> Vec<String> {
        self.stopwords.filter(tokens)
    }

    /// Pattern-based entities with byte offsets.
    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        extract_entities(text)
    }

    /// Lexicon sentiment over all tokens (stopwords included).
    pub fn analyze_sentiment(&self, text: &str) -> Sentiment {
        if text.is_empty() {
            return Sentiment::neutral();
        }
        sentiment::score_tokens(&self.tokenize(text))
    }

    /// Run the whole pass. Tokens derive from the cleaned text; entities and
    /// sentiment from the original.
    pub fn preprocess_pipeline(&self, text: &str, remove_stops: bool) -> PreprocessResult {
        if text.is_empty() {
            return PreprocessResult::empty();
        }

        let cleaned = self.clean_text(text);
        let mut tokens = self.tokenize(&cleaned);
        if remove_stops {
            tokens = self.remove_stopwords(tokens);
        }
        let entities = self.extract_entities(text);
        let sentiment = self.analyze_sentiment(text);

        debug!(
            tokens = tokens.len(),
            entities = entities.len(),
            sentiment = %sentiment.label,
            "Preprocessed text"
        );

        PreprocessResult {
            original: text.to_string(),
            cleaned,
            tokens,
            entities,
            sentiment,
        }
    }
}
