//! # prattle-config
//!
//! Configuration system for the Prattle responder. Reads from `prattle.toml`
//! and environment variables, in that precedence order.
//!
//! The `[lexicon]` section is the single source of every word list and
//! pattern table the cascade consumes (guards, FAQ, topics, follow-ups,
//! knowledge patterns, sentiment words).
//!
//! Supports hot-reload via filesystem watcher.

pub mod lexicon;
pub mod loader;
pub mod schema;

pub use lexicon::LexiconConfig;
pub use loader::ConfigLoader;
pub use schema::PrattleConfig;
pub use schema::{ConfigWarning, WarningSeverity};
