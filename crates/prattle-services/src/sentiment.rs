use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use prattle_config::lexicon::SentimentLexicon;
use prattle_core::text::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Question,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Negative => write!(f, "negative"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Question => write!(f, "question"),
        }
    }
}

/// Result of scoring one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    /// Positive minus negative weight.
    pub score: f64,
    pub sentiment: Sentiment,
    /// The text reads as a question (question word or question mark).
    pub question: bool,
    /// An excitement marker was present.
    pub excited: bool,
}

impl SentimentReport {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            sentiment: Sentiment::Neutral,
            question: false,
            excited: false,
        }
    }
}

pub trait SentimentService: Send + Sync {
    fn analyze(&self, text: &str) -> SentimentReport;
}

/// Word-list scorer.
///
/// A negation flips the next sentiment word; an intensifier doubles it.
/// Entries containing a space are matched as phrases against the
/// normalized text. Negative scores win over the question flag; a
/// question outranks a positive score.
pub struct LexiconSentiment {
    positive: HashSet<String>,
    negative: HashSet<String>,
    positive_phrases: Vec<String>,
    negative_phrases: Vec<String>,
    question: HashSet<String>,
    excited: HashSet<String>,
    negations: HashSet<String>,
    intensifiers: HashSet<String>,
}

fn split_terms(terms: &[String]) -> (HashSet<String>, Vec<String>) {
    let mut words = HashSet::new();
    let mut phrases = Vec::new();
    for term in terms {
        let term = normalize(term);
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        if term.contains(' ') {
            phrases.push(term.to_string());
        } else {
            words.insert(term.to_string());
        }
    }
    (words, phrases)
}

fn word_set(terms: &[String]) -> HashSet<String> {
    split_terms(terms).0
}

impl LexiconSentiment {
    pub fn from_lexicon(lexicon: &SentimentLexicon) -> Self {
        let (positive, positive_phrases) = split_terms(&lexicon.positive);
        let (negative, negative_phrases) = split_terms(&lexicon.negative);
        Self {
            positive,
            negative,
            positive_phrases,
            negative_phrases,
            question: word_set(&lexicon.question),
            excited: word_set(&lexicon.excited),
            negations: word_set(&lexicon.negations),
            intensifiers: word_set(&lexicon.intensifiers),
        }
    }

    fn polarity(&self, word: &str) -> f64 {
        if self.positive.contains(word) {
            1.0
        } else if self.negative.contains(word) {
            -1.0
        } else {
            0.0
        }
    }
}

impl SentimentService for LexiconSentiment {
    fn analyze(&self, text: &str) -> SentimentReport {
        let normalized = normalize(text);
        let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

        let mut score = 0.0;
        let mut negate = false;
        let mut weight = 1.0;
        let mut question = text.contains('?') || text.contains('؟');
        let mut excited = false;

        for word in normalized.split_whitespace() {
            question |= self.question.contains(word);
            excited |= self.excited.contains(word);

            if self.negations.contains(word) {
                negate = !negate;
                continue;
            }
            if self.intensifiers.contains(word) {
                weight *= 2.0;
                continue;
            }
            let polarity = self.polarity(word);
            if polarity != 0.0 {
                score += if negate { -polarity } else { polarity } * weight;
                negate = false;
                weight = 1.0;
            }
        }

        for phrase in &self.positive_phrases {
            score += padded.matches(&format!(" {phrase} ")).count() as f64;
        }
        for phrase in &self.negative_phrases {
            score -= padded.matches(&format!(" {phrase} ")).count() as f64;
        }

        let sentiment = if score < 0.0 {
            Sentiment::Negative
        } else if question {
            Sentiment::Question
        } else if score > 0.0 {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        };

        SentimentReport {
            score,
            sentiment,
            question,
            excited: excited || (score > 0.0 && text.contains('!')),
        }
    }
}
