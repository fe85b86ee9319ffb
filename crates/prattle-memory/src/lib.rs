//! # prattle-memory
//!
//! Memory tiers for the Prattle responder:
//!
//! - **Persistent store**: the key-value contract (`has/get/set/push/delete`)
//!   with SQLite and in-memory backends.
//! - **Knowledge graph**: append-only triples extracted from user text.
//! - **Markov model**: gram → weighted next-token counts, learned per channel.
//! - **Short-term memory**: the last few accepted replies, in RAM only,
//!   for a bounded number of recently active channels.
//! - **Semantic matcher**: term-frequency cosine similarity over prior replies.

pub mod knowledge;
pub mod markov;
pub mod semantic;
pub mod store;
pub mod working;

pub use knowledge::{KnowledgeExtractor, KnowledgeGraph};
pub use markov::{MarkovChain, MarkovModel};
pub use semantic::{SemanticMatcher, TermVector, cosine_similarity, term_frequency};
pub use store::{InMemoryStore, KeyValueStore, SqliteStore, open_store};
pub use working::{ChannelMap, ShortTermMemory, WorkingMemory};
