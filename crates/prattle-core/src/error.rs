use thiserror::Error;

/// Unified error type for the entire Prattle runtime.
#[derive(Error, Debug)]
pub enum PrattleError {
    // ── Storage errors ─────────────────────────────────────────
    #[error("store error: {0}")]
    Store(String),

    #[error("malformed value under key {key}: {reason}")]
    MalformedValue { key: String, reason: String },

    // ── External service errors ────────────────────────────────
    #[error("search failed: {source_name}: {reason}")]
    Search { source_name: String, reason: String },

    #[error("search timed out after {timeout_secs}s")]
    SearchTimeout { timeout_secs: u64 },

    // ── Cascade errors ─────────────────────────────────────────
    #[error("stage {stage} failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error("knowledge extraction failed: {0}")]
    Extraction(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Surface errors ─────────────────────────────────────────
    #[error("server error: {0}")]
    Server(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PrattleError {
    /// Shorthand for a stage failure.
    pub fn stage(stage: &str, reason: impl std::fmt::Display) -> Self {
        Self::Stage {
            stage: stage.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrattleError>;
