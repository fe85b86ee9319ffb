//! # prattle-core
//!
//! Core types and primitives for the Prattle conversational responder.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: conversation records, knowledge triples, markov entries, the
//! channel key namespace, and the tokenizer.

pub mod error;
pub mod message;
pub mod text;
pub mod types;

pub use error::{PrattleError, Result};
pub use message::{MessageRecord, Role};
pub use text::Tokenizer;
pub use types::*;
