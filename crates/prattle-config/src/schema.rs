use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::lexicon::LexiconConfig;

/// Root configuration, mapped from `prattle.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrattleConfig {
    pub responder: ResponderConfig,
    pub markov: MarkovConfig,
    pub semantic: SemanticConfig,
    pub memory: MemoryConfig,
    pub search: SearchConfig,
    pub ranking: RankingConfig,
    pub lexicon: LexiconConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Responder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Seeded as entry 0 of every channel's history.
    pub system_prompt: String,
    /// Generic replies used when every other stage came up empty.
    pub fallback_responses: Vec<String>,
    /// How many knowledge-graph matches go into one reply.
    pub knowledge_results: usize,
    /// Separator between rendered knowledge matches.
    pub knowledge_separator: String,
    /// Fixed seed for the random source. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are Prattle, a playful chat companion. Speak simply, use emoji, \
                            and if you don't understand something, say so."
                .into(),
            fallback_responses: vec![
                "I'm just a kid, I don't get it 😅".into(),
                "Hmm, tell me more? 🤔".into(),
            ],
            knowledge_results: 3,
            knowledge_separator: "; ".into(),
            rng_seed: None,
        }
    }
}

// ── Markov ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    /// Gram width.
    pub order: usize,
    /// How the next token is chosen.
    pub selection: Selection,
    /// How the starting gram is chosen among grams matching the input.
    pub start: StartStrategy,
    /// Hard cap on generation iterations.
    pub max_steps: usize,
    /// Hard cap on generated tokens.
    pub max_tokens: usize,
    /// Generated text shorter than this is discarded.
    pub min_tokens: usize,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            order: 2,
            selection: Selection::Greedy,
            start: StartStrategy::First,
            max_steps: 50,
            max_tokens: 15,
            min_tokens: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Highest count wins; ties go to the first-seen token.
    Greedy,
    /// Sample proportionally to counts.
    Weighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartStrategy {
    First,
    Random,
}

impl FromStr for Selection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "weighted" => Ok(Self::Weighted),
            other => Err(format!("unknown markov selection '{other}'")),
        }
    }
}

// ── Semantic ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// A prior reply is reused only when its similarity exceeds this.
    pub threshold: f64,
    /// Also consider short-term memory replies as candidates.
    pub use_short_term: bool,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            use_short_term: true,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Persistent store implementation.
    pub backend: StoreBackend,
    /// Path to the SQLite database.
    pub db_path: PathBuf,
    /// Recent replies kept in short-term memory per channel.
    pub short_term_capacity: usize,
    /// Channels whose short-term memory and ranking stay in RAM. The least
    /// recently active channel is dropped beyond this.
    pub max_active_channels: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db_path: PathBuf::from("prattle.db"),
            short_term_capacity: 5,
            max_active_channels: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

// ── Search ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Enable the web-search stage.
    pub enabled: bool,
    /// DuckDuckGo Instant Answer endpoint.
    pub duckduckgo_url: String,
    /// MediaWiki search endpoint.
    pub wikipedia_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Snippet characters quoted in a reply.
    pub max_reply_chars: usize,
    /// Text placed before the quoted snippet.
    pub reply_prefix: String,
    /// Feed returned snippets into the channel's markov model and knowledge graph.
    pub learn_from_results: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duckduckgo_url: "https://api.duckduckgo.com/".into(),
            wikipedia_url: "https://en.wikipedia.org/w/api.php".into(),
            timeout_secs: 5,
            max_reply_chars: 100,
            reply_prefix: "I found this online: ".into(),
            learn_from_results: true,
        }
    }
}

// ── Ranking ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Maximum ranked replies kept per channel.
    pub capacity: usize,
    pub base_score: f64,
    /// Added once per lexicon topic whose keywords appear in the reply.
    pub topic_bonus: f64,
    /// Multiplied by the number of query tokens found in the reply.
    pub query_overlap_weight: f64,
    /// Multiplied by (positive words - negative words) in the reply.
    pub sentiment_weight: f64,
    /// Source name (lowercase) to trust bonus.
    pub trusted_sources: HashMap<String, f64>,
    /// Entries older than this are pruned.
    pub max_age_hours: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            base_score: 1.0,
            topic_bonus: 2.0,
            query_overlap_weight: 1.5,
            sentiment_weight: 0.5,
            trusted_sources: HashMap::from([
                ("wikipedia".to_string(), 3.0),
                ("duckduckgo".to_string(), 2.0),
            ]),
            max_age_hours: 24,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Allow cross-origin requests (browser chat widgets).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            cors: true,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl PrattleConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Markov ───
        if self.markov.order == 0 {
            warnings.push(ConfigWarning {
                field: "markov.order".into(),
                message: "gram width must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: Some("The classic setting is 2".into()),
            });
        }
        if self.markov.max_tokens < self.markov.min_tokens {
            warnings.push(ConfigWarning {
                field: "markov.max_tokens".into(),
                message: format!(
                    "max_tokens {} is below min_tokens {}, generation can never succeed",
                    self.markov.max_tokens, self.markov.min_tokens
                ),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Semantic threshold ───
        let threshold = self.semantic.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            warnings.push(ConfigWarning {
                field: "semantic.threshold".into(),
                message: format!("threshold {threshold} is out of range"),
                severity: WarningSeverity::Error,
                hint: Some("Cosine similarity lies between 0.0 and 1.0".into()),
            });
        } else if !(0.2..=0.4).contains(&threshold) {
            warnings.push(ConfigWarning {
                field: "semantic.threshold".into(),
                message: format!("threshold {threshold} is unusual"),
                severity: WarningSeverity::Warning,
                hint: Some("Values between 0.2 and 0.4 work best".into()),
            });
        }

        // ── Capacities ───
        if self.memory.short_term_capacity == 0 {
            warnings.push(ConfigWarning {
                field: "memory.short_term_capacity".into(),
                message: "short-term memory cannot hold anything".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        }
        if self.memory.max_active_channels == 0 {
            warnings.push(ConfigWarning {
                field: "memory.max_active_channels".into(),
                message: "no channel could keep in-memory state".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 10000".into()),
            });
        }
        if self.ranking.capacity == 0 {
            warnings.push(ConfigWarning {
                field: "ranking.capacity".into(),
                message: "ranking structure cannot hold anything".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 50".into()),
            });
        }

        // ── Responder ───
        if self.responder.fallback_responses.iter().all(|r| r.trim().is_empty()) {
            warnings.push(ConfigWarning {
                field: "responder.fallback_responses".into(),
                message: "no fallback replies configured, a built-in reply will be used".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Lexicon patterns ───
        for (i, rule) in self.lexicon.follow_ups.iter().enumerate() {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                warnings.push(ConfigWarning {
                    field: format!("lexicon.follow_ups[{i}].pattern"),
                    message: format!("invalid regex: {e}"),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            }
        }
        for (i, rule) in self.lexicon.knowledge_patterns.iter().enumerate() {
            match regex::Regex::new(&rule.pattern) {
                Ok(re) => {
                    let groups = re.captures_len() - 1;
                    let predicate_group = rule
                        .predicate
                        .strip_prefix('$')
                        .and_then(|g| g.parse::<usize>().ok())
                        .unwrap_or(0);
                    let highest = rule.subject.max(rule.object).max(predicate_group);
                    if rule.subject == 0 || rule.object == 0 || highest > groups {
                        warnings.push(ConfigWarning {
                            field: format!("lexicon.knowledge_patterns[{i}]"),
                            message: format!(
                                "capture groups out of range (pattern has {groups})"
                            ),
                            severity: WarningSeverity::Error,
                            hint: Some("Group numbers start at 1".into()),
                        });
                    }
                }
                Err(e) => warnings.push(ConfigWarning {
                    field: format!("lexicon.knowledge_patterns[{i}].pattern"),
                    message: format!("invalid regex: {e}"),
                    severity: WarningSeverity::Error,
                    hint: None,
                }),
            }
        }
        for (i, topic) in self.lexicon.topics.iter().enumerate() {
            if topic.responses.is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("lexicon.topics[{i}].responses"),
                    message: format!("topic '{}' has no replies and will never answer", topic.name),
                    severity: WarningSeverity::Warning,
                    hint: None,
                });
            }
        }

        // ── Search ───
        if self.search.enabled && self.search.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "search.timeout_secs".into(),
                message: "timeout is 0, every search will time out".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 5".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:3000'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0, server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:3000' for local-only access".into()),
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
