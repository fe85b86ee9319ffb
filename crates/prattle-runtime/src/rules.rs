use std::collections::HashSet;

use rand::Rng;
use regex::Regex;

use prattle_config::LexiconConfig;
use prattle_config::lexicon::{FaqEntry, GuardConfig, TopicEntry};
use prattle_core::text::normalize;
use prattle_core::{PrattleError, Result};

/// How a guard compares its terms with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// Single words match whole words; phrases match as substrings.
    Words,
    /// Every term matches as a substring of the lowercased input.
    Substring,
}

/// A fixed-response guard.
#[derive(Debug, Clone)]
pub struct Guard {
    mode: GuardMode,
    words: HashSet<String>,
    phrases: Vec<String>,
    response: String,
}

impl Guard {
    pub fn new(config: &GuardConfig, mode: GuardMode) -> Self {
        let mut words = HashSet::new();
        let mut phrases = Vec::new();
        for term in &config.terms {
            let term = match mode {
                GuardMode::Words => normalize(term).trim().to_string(),
                GuardMode::Substring => term.trim().to_lowercase(),
            };
            if term.is_empty() {
                continue;
            }
            if mode == GuardMode::Words && !term.contains(char::is_whitespace) {
                words.insert(term);
            } else {
                phrases.push(term);
            }
        }
        Self {
            mode,
            words,
            phrases,
            response: config.response.clone(),
        }
    }

    /// The guard response if any term is present. A guard without a
    /// response never fires.
    pub fn check(&self, text: &str) -> Option<&str> {
        if self.response.trim().is_empty() {
            return None;
        }
        let haystack = match self.mode {
            GuardMode::Words => normalize(text).split_whitespace().collect::<Vec<_>>().join(" "),
            GuardMode::Substring => text.to_lowercase(),
        };
        let word_hit = haystack.split_whitespace().any(|w| self.words.contains(w));
        let phrase_hit = self.phrases.iter().any(|p| haystack.contains(p.as_str()));
        (word_hit || phrase_hit).then_some(self.response.as_str())
    }
}

/// A compiled follow-up rule: pattern plus `{N}` template.
#[derive(Debug, Clone)]
pub struct FollowUp {
    regex: Regex,
    template: String,
}

impl FollowUp {
    pub fn respond(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        let mut reply = self.template.clone();
        for i in 1..caps.len() {
            let value = caps.get(i).map(|m| m.as_str().trim()).unwrap_or_default();
            reply = reply.replace(&format!("{{{i}}}"), value);
        }
        Some(reply)
    }
}

/// Which reply a topic produced, and whether its used-reply record restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPick {
    pub reply: String,
    /// Every reply had been used; the record starts over with this one.
    pub recycled: bool,
}

/// Every rule-driven stage compiled from the lexicon.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub sensitive: Guard,
    pub insults: Guard,
    pub forbidden: Guard,
    faq: Vec<FaqEntry>,
    topics: Vec<TopicEntry>,
    follow_ups: Vec<FollowUp>,
}

impl RuleSet {
    pub fn from_lexicon(lexicon: &LexiconConfig) -> Result<Self> {
        let follow_ups = lexicon
            .follow_ups
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| FollowUp {
                        regex,
                        template: rule.response.clone(),
                    })
                    .map_err(|e| PrattleError::ConfigValidation {
                        field: "lexicon.follow_ups".into(),
                        reason: format!("'{}': {}", rule.pattern, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let faq = lexicon
            .faq
            .iter()
            .map(|entry| FaqEntry {
                triggers: entry
                    .triggers
                    .iter()
                    .map(|t| t.to_lowercase())
                    .filter(|t| !t.trim().is_empty())
                    .collect(),
                response: entry.response.clone(),
            })
            .collect();

        let topics = lexicon
            .topics
            .iter()
            .map(|topic| TopicEntry {
                keywords: topic.keywords.iter().map(|k| normalize(k).trim().to_string()).collect(),
                ..topic.clone()
            })
            .collect();

        Ok(Self {
            sensitive: Guard::new(&lexicon.sensitive, GuardMode::Words),
            insults: Guard::new(&lexicon.insults, GuardMode::Words),
            forbidden: Guard::new(&lexicon.forbidden_questions, GuardMode::Substring),
            faq,
            topics,
            follow_ups,
        })
    }

    /// First FAQ entry (in table order) with a trigger contained in the input.
    pub fn faq(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.faq
            .iter()
            .find(|entry| entry.triggers.iter().any(|t| lowered.contains(t.as_str())))
            .map(|entry| entry.response.as_str())
    }

    /// First topic with a keyword among the input's words.
    pub fn topic(&self, words: &[String]) -> Option<&TopicEntry> {
        self.topics.iter().find(|topic| {
            !topic.responses.is_empty() && topic.keywords.iter().any(|k| words.contains(k))
        })
    }

    /// Topics whose keywords appear among `words`.
    pub fn topics_mentioned<'a>(&'a self, words: &'a [String]) -> impl Iterator<Item = &'a TopicEntry> {
        self.topics
            .iter()
            .filter(move |topic| topic.keywords.iter().any(|k| words.contains(k)))
    }

    /// First follow-up rule that matches the raw input.
    pub fn follow_up(&self, text: &str) -> Option<String> {
        self.follow_ups.iter().find_map(|rule| rule.respond(text))
    }
}

/// Pick a topic reply. For no-repeat topics, replies in `used` are skipped
/// until every reply has been used once.
pub fn pick_topic_reply<R: Rng + ?Sized>(
    topic: &TopicEntry,
    used: &[String],
    rng: &mut R,
) -> Option<TopicPick> {
    if topic.responses.is_empty() {
        return None;
    }
    let fresh: Vec<&String> = if topic.no_repeat {
        topic.responses.iter().filter(|r| !used.contains(r)).collect()
    } else {
        Vec::new()
    };

    let (pool, recycled) = if fresh.is_empty() {
        (topic.responses.iter().collect::<Vec<_>>(), topic.no_repeat)
    } else {
        (fresh, false)
    };
    let reply = pool[rng.gen_range(0..pool.len())].clone();
    Some(TopicPick { reply, recycled })
}

/// Uniform pick from a reply list; `None` when the list is empty.
pub fn pick_one<'a, R: Rng + ?Sized>(replies: &'a [String], rng: &mut R) -> Option<&'a str> {
    if replies.is_empty() {
        return None;
    }
    Some(replies[rng.gen_range(0..replies.len())].as_str())
}
