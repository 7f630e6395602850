//! Keyword rules for categorization and intent detection.
//!
//! `CategoryRules` is the fallback when the model's category answer is
//! unusable or the call fails. `IntentRules` is the whole of chatbot intent
//! detection; it never calls the model.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::Intent;

/// Which email field a category rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    Subject,
    Body,
    Either,
}

/// Maps matching email text to a category name.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    /// Human-readable pattern description.
    pub pattern: String,
    pub regex: Regex,
    pub field: RuleField,
    pub category: String,
}

/// Ordered email category rules. First match wins.
#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// Rules for the default Business/Support/Meeting/Finance categories.
    pub fn default_rules() -> Self {
        let rule = |pattern: &str, regex: &str, category: &str| CategoryRule {
            pattern: pattern.into(),
            regex: Regex::new(regex).expect("category rule regex is valid"),
            field: RuleField::Either,
            category: category.into(),
        };

        let rules = vec![
            rule(
                "meeting words",
                r"(?i)\b(meeting|meet|schedule[ds]?|calendar|appointment|call|agenda|reschedul\w*)\b",
                "Meeting",
            ),
            rule(
                "money words",
                r"(?i)\b(invoices?|payments?|pay|paid|budget|billing|refund|expenses?|quote|pricing)\b",
                "Finance",
            ),
            rule(
                "support words",
                r"(?i)\b(issues?|help|errors?|bug|broken|problem|support|ticket|not working)\b",
                "Support",
            ),
            rule(
                "deal words",
                r"(?i)\b(proposal|partnership|contract|deal|collaborat\w*|opportunity)\b",
                "Business",
            ),
        ];

        Self { rules }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a custom rule, checked after the existing ones.
    pub fn add_rule(
        &mut self,
        pattern: &str,
        field: RuleField,
        category: &str,
    ) -> Result<(), regex::Error> {
        self.rules.push(CategoryRule {
            pattern: pattern.into(),
            regex: Regex::new(pattern)?,
            field,
            category: category.into(),
        });
        Ok(())
    }

    /// First rule whose category is in `allowed` and whose regex matches.
    ///
    /// Returns the spelling from `allowed`, so the result is always a
    /// configured category.
    pub fn evaluate(&self, subject: &str, body: &str, allowed: &[String]) -> Option<String> {
        for rule in &self.rules {
            let Some(category) = allowed
                .iter()
                .find(|c| c.eq_ignore_ascii_case(&rule.category))
            else {
                continue;
            };

            let hit = match rule.field {
                RuleField::Subject => rule.regex.is_match(subject),
                RuleField::Body => rule.regex.is_match(body),
                RuleField::Either => rule.regex.is_match(subject) || rule.regex.is_match(body),
            };
            if hit {
                debug!(rule = %rule.pattern, category = %category, "Email matched category rule");
                return Some(category.clone());
            }
        }
        None
    }
}

/// Maps chat text to an intent with a fixed confidence.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub regex: Regex,
    pub intent: Intent,
    pub confidence: f32,
}

/// Ordered intent rules. First match wins; no match is `Other`.
#[derive(Debug, Clone)]
pub struct IntentRules {
    rules: Vec<IntentRule>,
    fallback_confidence: f32,
}

impl IntentRules {
    pub fn default_rules() -> Self {
        let rule = |regex: &str, intent: Intent, confidence: f32| IntentRule {
            regex: Regex::new(regex).expect("intent rule regex is valid"),
            intent,
            confidence,
        };

        let rules = vec![
            rule(r"(?i)\b(hi|hello|hey)\b", Intent::Greeting, 0.9),
            rule(r"\?", Intent::Question, 0.8),
            rule(r"(?i)\b(can|could|please)\b", Intent::Request, 0.7),
            rule(r"(?i)\b(bad|issue|problem|wrong)\b", Intent::Complaint, 0.7),
            rule(
                r"(?i)\b(feedback|suggestion|suggest|recommend)\b",
                Intent::Feedback,
                0.6,
            ),
        ];

        Self {
            rules,
            fallback_confidence: 0.6,
        }
    }

    pub fn evaluate(&self, text: &str) -> (Intent, f32) {
        self.rules
            .iter()
            .find(|r| r.regex.is_match(text))
            .map(|r| (r.intent, r.confidence))
            .unwrap_or((Intent::Other, self.fallback_confidence))
    }
}
