//! Text normalization and tokenization.
//!
//! The tokenizer is pure: lowercase, strip punctuation, split on whitespace
//! (zero-width joiners and non-joiners count as whitespace), then drop
//! single-character tokens and stopwords.

use std::collections::HashSet;

/// Stopwords removed by [`Tokenizer::default`].
pub const DEFAULT_STOPWORDS: &[&str] = &[
    // English
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "am", "of", "to", "in", "on",
    "at", "by", "for", "with", "and", "or", "but", "it", "its", "this", "that", "these", "those",
    "do", "does", "did", "so", "if", "as", "from", "into", "than", "then",
    // Persian
    "و", "در", "به", "که", "از", "را", "با", "این", "آن", "هم", "تا", "برای",
];

/// Splits text into normalized, filtered tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_STOPWORDS.iter().copied())
    }
}

impl Tokenizer {
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stopwords: stopwords
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Lowercased, punctuation-free tokens without length or stopword filtering.
    pub fn words(&self, text: &str) -> Vec<String> {
        normalize(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Full tokenization: [`Tokenizer::words`] minus short tokens and stopwords.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        normalize(text)
            .split_whitespace()
            .filter(|w| w.chars().count() > 1 && !self.stopwords.contains(*w))
            .map(str::to_string)
            .collect()
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

/// Lowercase `text`, turn zero-width joiners into spaces and drop every
/// character that is neither alphanumeric nor whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' => Some(' '),
            c if c.is_alphanumeric() || c.is_whitespace() => Some(c),
            _ => None,
        })
        .collect()
}
