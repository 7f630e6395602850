//! English stopword list.

use std::collections::HashSet;

/// The standard NLTK English stopword list.
pub const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

/// Stopword filter.
#[derive(Debug, Clone)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    /// English stopwords.
    pub fn english() -> Self {
        Self::with_custom_list(ENGLISH_STOPWORDS.iter().map(|w| w.to_string()))
    }

    /// Build from a caller-supplied word list.
    pub fn with_custom_list<I>(words: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            words: words.into_iter().collect(),
        }
    }

    /// Whether `word` is in the list. Callers pass lowercased tokens.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Drop stopwords, keeping token order.
    pub fn filter(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .filter(|t| !self.is_stopword(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for Stopwords {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_list_is_complete() {
        assert_eq!(Stopwords::english().len(), 179);
    }

    #[test]
    fn filter_keeps_content_words_in_order() {
        let tokens = ["please", "send", "me", "the", "invoice", "by", "friday"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            Stopwords::english().filter(tokens),
            vec!["please", "send", "invoice", "friday"]
        );
    }

    #[test]
    fn custom_list_replaces_default() {
        let stops = Stopwords::with_custom_list(vec!["invoice".to_string()]);
        assert!(stops.is_stopword("invoice"));
        assert!(!stops.is_stopword("the"));
    }
}
