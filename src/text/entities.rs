//! Pattern-based named entity recognizer.
//!
//! Recognizes the entity kinds that matter in business mail (contacts,
//! amounts, dates, organisations) with regular expressions. Offsets are
//! byte offsets into the original text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityLabel {
    Email,
    Url,
    Money,
    Percent,
    Date,
    Time,
    Org,
    Person,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Url => "URL",
            Self::Money => "MONEY",
            Self::Percent => "PERCENT",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Org => "ORG",
            Self::Person => "PERSON",
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized entity span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
}

struct Pattern {
    regex: Regex,
    label: EntityLabel,
    /// Capture group holding the entity (0 = whole match).
    group: usize,
}

const MONTHS: &str = "Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?";

const SALUTATIONS: &str = r"Hello|Hi|Hey|Dear|Thanks|Thank[ \t]+you|Regards|Greetings";

fn pattern(regex: &str, label: EntityLabel, group: usize) -> Pattern {
    Pattern {
        regex: Regex::new(regex).expect("entity pattern is valid"),
        label,
        group,
    }
}

/// Patterns in priority order: on an identical span the earlier one wins.
static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            EntityLabel::Email,
            0,
        ),
        pattern(
            r#"\b(?:https?://|www\.)[^\s<>"]*[^\s<>".,;:!?)\]]"#,
            EntityLabel::Url,
            0,
        ),
        pattern(
            r"[$€£]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|thousand|[kKmMbB]\b))?|\b\d[\d,]*(?:\.\d+)?\s?(?:USD|EUR|GBP|dollars)\b",
            EntityLabel::Money,
            0,
        ),
        pattern(r"\b\d+(?:\.\d+)?\s?(?:%|percent\b)", EntityLabel::Percent, 0),
        pattern(
            &format!(
                r"\b\d{{4}}-\d{{2}}-\d{{2}}\b|\b\d{{1,2}}/\d{{1,2}}/\d{{2,4}}\b|\b(?:{MONTHS})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?\b|\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{MONTHS})(?:,?\s+\d{{4}})?\b|\bQ[1-4]\s+\d{{4}}\b|\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b|(?i:\b(?:today|tomorrow|yesterday|(?:next|last|this) (?:week|month|quarter|year))\b)"
            ),
            EntityLabel::Date,
            0,
        ),
        pattern(
            r"\b\d{1,2}:\d{2}(?:\s?(?:[aApP]\.?[mM]\.?))?|\b\d{1,2}\s?(?:am|pm|AM|PM)\b",
            EntityLabel::Time,
            0,
        ),
        // Names stay on one line; a leading salutation is not part of the name.
        pattern(
            &format!(
                r"\b(?:(?:{SALUTATIONS})[ \t,]+)?([A-Z][\w&]*(?:[ \t]+[A-Z][\w&]*)*[ \t]+(?:Inc|Corp|Corporation|LLC|Ltd|Company|Group|Technologies|Solutions|Partners)\b\.?)"
            ),
            EntityLabel::Org,
            1,
        ),
        pattern(
            r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?[ \t]+[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?",
            EntityLabel::Person,
            0,
        ),
        pattern(
            r"\bDear[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)",
            EntityLabel::Person,
            1,
        ),
    ]
});

/// Extract entities from `text`.
///
/// Overlapping matches resolve to the one starting first, then the longest.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for pattern in PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            if let Some(m) = caps.get(pattern.group) {
                found.push(Entity {
                    text: m.as_str().to_string(),
                    label: pattern.label,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
    }

    // Stable sort keeps pattern priority for identical spans.
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut entities = Vec::with_capacity(found.len());
    let mut last_end = 0;
    for entity in found {
        if entity.start >= last_end {
            last_end = entity.end;
            entities.push(entity);
        }
    }
    entities
}
