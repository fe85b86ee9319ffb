//! # prattle-runtime
//!
//! The responder: one call per incoming message, answered by the first
//! cascade stage that produces something.
//!
//! ```text
//!   message ──► guards (sensitive, insult, forbidden)
//!                 │ learn: markov, plus knowledge graph for statements
//!                 ▼
//!               faq ► topic ► knowledge ► follow-up ► sentiment
//!                 ▼
//!               search (learns snippets) ► ranked ► markov ► semantic ► fallback
//!                 │
//!                 ▼
//!        history + short-term memory ──► reply
//! ```

pub mod locks;
pub mod ranking;
pub mod responder;
pub mod rules;

pub use locks::{ChannelGuard, ChannelLocks};
pub use ranking::{RankedResponse, ResponseRanking};
pub use responder::{Reply, Responder, Stage};
pub use rules::RuleSet;
