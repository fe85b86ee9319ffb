//! # prattle-services
//!
//! Services the responder consumes but does not own: a web search that
//! merges several sources and never fails outright, and a lexicon-driven
//! sentiment scorer. Deterministic mocks live in [`mock`].

pub mod mock;
pub mod search;
pub mod sentiment;

pub use search::{HttpSearchService, NoopSearch, Snippet, WebSearch};
pub use sentiment::{LexiconSentiment, Sentiment, SentimentReport, SentimentService};
