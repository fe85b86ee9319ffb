use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use prattle_config::lexicon::KnowledgePattern;
use prattle_core::{ChannelKeys, PrattleError, Result, Tokenizer, Triple};

use crate::store::{KeyValueStore, load_sequence, push_item};

enum PredicateSource {
    Literal(String),
    Group(usize),
}

struct ExtractionRule {
    regex: Regex,
    subject: usize,
    predicate: PredicateSource,
    object: usize,
}

/// Turns raw text into triples using the configured pattern table.
pub struct KnowledgeExtractor {
    rules: Vec<ExtractionRule>,
}

impl KnowledgeExtractor {
    pub fn from_patterns(patterns: &[KnowledgePattern]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for p in patterns {
            let regex = Regex::new(&p.pattern).map_err(|e| {
                PrattleError::Extraction(format!("invalid pattern '{}': {}", p.pattern, e))
            })?;
            let predicate = match p.predicate.strip_prefix('$').map(str::parse::<usize>) {
                Some(Ok(group)) => PredicateSource::Group(group),
                _ => PredicateSource::Literal(p.predicate.clone()),
            };
            rules.push(ExtractionRule {
                regex,
                subject: p.subject,
                predicate,
                object: p.object,
            });
        }
        Ok(Self { rules })
    }

    /// Extract every triple, in pattern-table order then match order.
    ///
    /// A match whose subject, predicate, or object is empty is dropped.
    pub fn extract(&self, text: &str) -> Vec<Triple> {
        let mut triples = Vec::new();
        for rule in &self.rules {
            for caps in rule.regex.captures_iter(text) {
                let group = |i: usize| {
                    caps.get(i)
                        .map(|m| m.as_str().trim().to_lowercase())
                        .unwrap_or_default()
                };
                let subject = group(rule.subject);
                let object = group(rule.object);
                let predicate = match &rule.predicate {
                    PredicateSource::Literal(p) => p.clone(),
                    PredicateSource::Group(i) => group(*i),
                };
                if subject.is_empty() || predicate.is_empty() || object.is_empty() {
                    continue;
                }
                triples.push(Triple::new(subject, predicate, object));
            }
        }
        triples
    }
}

/// Per-channel append-only fact store.
///
/// Duplicate facts are kept; every restatement adds another triple.
pub struct KnowledgeGraph {
    store: Arc<dyn KeyValueStore>,
    extractor: KnowledgeExtractor,
    tokenizer: Tokenizer,
}

impl KnowledgeGraph {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        extractor: KnowledgeExtractor,
        tokenizer: Tokenizer,
    ) -> Self {
        Self {
            store,
            extractor,
            tokenizer,
        }
    }

    /// Extract triples from `text` and append them to the channel's graph.
    /// Returns the triples that were added.
    pub async fn add_knowledge(&self, channel: &str, text: &str) -> Result<Vec<Triple>> {
        let triples = self.extractor.extract(text);
        if triples.is_empty() {
            return Ok(triples);
        }
        let key = ChannelKeys::for_channel(channel).knowledge;
        for triple in &triples {
            push_item(self.store.as_ref(), &key, triple).await?;
        }
        debug!(channel, added = triples.len(), "knowledge learned");
        Ok(triples)
    }

    /// All triples stored for a channel, oldest first.
    pub async fn triples(&self, channel: &str) -> Result<Vec<Triple>> {
        let key = ChannelKeys::for_channel(channel).knowledge;
        load_sequence(self.store.as_ref(), &key).await
    }

    /// Triples whose subject or object shares a token with `query`, oldest first.
    ///
    /// `subject_filter` further restricts matches by subject.
    pub async fn query_knowledge(
        &self,
        channel: &str,
        query: &str,
        subject_filter: Option<&(dyn Fn(&str) -> bool + Sync)>,
    ) -> Result<Vec<Triple>> {
        let query_tokens = self.tokenizer.tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .triples(channel)
            .await?
            .into_iter()
            .filter(|t| self.mentions(t, &query_tokens))
            .filter(|t| subject_filter.is_none_or(|f| f(&t.subject)))
            .collect();
        Ok(matches)
    }

    fn mentions(&self, triple: &Triple, query_tokens: &[String]) -> bool {
        self.tokenizer
            .words(&triple.subject)
            .into_iter()
            .chain(self.tokenizer.words(&triple.object))
            .any(|w| query_tokens.contains(&w))
    }
}
