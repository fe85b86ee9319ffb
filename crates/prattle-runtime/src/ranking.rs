use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use prattle_config::LexiconConfig;
use prattle_config::schema::RankingConfig;
use prattle_core::Tokenizer;
use prattle_core::text::normalize;

/// A candidate reply held by the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResponse {
    pub text: String,
    pub source: Option<String>,
    /// Accumulated score, without the freshness term.
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

impl RankedResponse {
    /// Score plus a freshness term that decays with age in hours.
    pub fn effective_score(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.updated_at).num_seconds().max(0) as f64 / 3600.0;
        self.score + 1.0 / (1.0 + age_hours)
    }
}

/// Bounded collection of candidate replies, highest score first.
///
/// Adding a reply that is already present raises its score and refreshes
/// its timestamp. Past capacity the lowest-scoring entry is dropped.
/// Entries with equal scores come back in an unspecified order.
pub struct ResponseRanking {
    config: RankingConfig,
    topic_keywords: Vec<HashSet<String>>,
    positive: HashSet<String>,
    negative: HashSet<String>,
    tokenizer: Tokenizer,
    entries: Vec<RankedResponse>,
}

impl ResponseRanking {
    pub fn new(config: RankingConfig, lexicon: &LexiconConfig) -> Self {
        let words = |list: &[String]| -> HashSet<String> {
            list.iter().map(|w| normalize(w).trim().to_string()).collect()
        };
        Self {
            topic_keywords: lexicon.topics.iter().map(|t| words(&t.keywords)).collect(),
            positive: words(&lexicon.sentiment.positive),
            negative: words(&lexicon.sentiment.negative),
            tokenizer: Tokenizer::new(lexicon.stopwords.iter()),
            config,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Score a reply without the freshness term.
    pub fn score(&self, text: &str, source: Option<&str>, query_tokens: &[String]) -> f64 {
        let tokens = self.tokenizer.words(text);

        let topics = self
            .topic_keywords
            .iter()
            .filter(|keywords| tokens.iter().any(|t| keywords.contains(t)))
            .count() as f64;
        let overlap = query_tokens.iter().filter(|q| tokens.contains(*q)).count() as f64;
        let positive = tokens.iter().filter(|t| self.positive.contains(*t)).count() as f64;
        let negative = tokens.iter().filter(|t| self.negative.contains(*t)).count() as f64;
        let trust = source
            .and_then(|s| self.config.trusted_sources.get(&s.to_lowercase()))
            .copied()
            .unwrap_or(0.0);

        self.config.base_score
            + self.config.topic_bonus * topics
            + self.config.query_overlap_weight * overlap
            + self.config.sentiment_weight * (positive - negative)
            + trust
    }

    pub fn add(&mut self, text: &str, source: Option<&str>, query_tokens: &[String]) {
        self.add_at(text, source, query_tokens, Utc::now());
    }

    /// [`add`](Self::add) with an explicit clock.
    pub fn add_at(
        &mut self,
        text: &str,
        source: Option<&str>,
        query_tokens: &[String],
        now: DateTime<Utc>,
    ) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let score = self.score(text, source, query_tokens);

        match self.entries.iter_mut().find(|e| e.text == text) {
            Some(existing) => {
                existing.score += score;
                existing.updated_at = now;
            }
            None => self.entries.push(RankedResponse {
                text: text.to_string(),
                source: source.map(String::from),
                score,
                updated_at: now,
            }),
        }

        while self.entries.len() > self.config.capacity.max(1) {
            self.remove_lowest(now);
        }
    }

    fn remove_lowest(&mut self, now: DateTime<Utc>) {
        let lowest = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.effective_score(now).total_cmp(&b.effective_score(now)))
            .map(|(i, _)| i);
        if let Some(i) = lowest {
            self.entries.swap_remove(i);
        }
    }

    fn ranked(&self, now: DateTime<Utc>) -> Vec<&RankedResponse> {
        let mut ranked: Vec<&RankedResponse> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.effective_score(now).total_cmp(&a.effective_score(now)));
        ranked
    }

    /// The `k` highest-scoring entries.
    pub fn get_top(&self, k: usize) -> Vec<&RankedResponse> {
        self.get_top_at(k, Utc::now())
    }

    pub fn get_top_at(&self, k: usize, now: DateTime<Utc>) -> Vec<&RankedResponse> {
        let mut ranked = self.ranked(now);
        ranked.truncate(k);
        ranked
    }

    /// Highest-scoring entry sharing at least one token with the query.
    pub fn best_match(&self, query_tokens: &[String]) -> Option<&RankedResponse> {
        self.best_match_at(query_tokens, Utc::now())
    }

    pub fn best_match_at(&self, query_tokens: &[String], now: DateTime<Utc>) -> Option<&RankedResponse> {
        if query_tokens.is_empty() {
            return None;
        }
        self.ranked(now).into_iter().find(|entry| {
            self.tokenizer
                .tokenize(&entry.text)
                .iter()
                .any(|t| query_tokens.contains(t))
        })
    }

    /// Drop entries not refreshed within `max_age`.
    pub fn prune_older_than(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let cutoff = now - max_age;
        self.entries.retain(|e| e.updated_at >= cutoff);
        before - self.entries.len()
    }
}
