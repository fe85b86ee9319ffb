use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation channel.
pub type ChannelId = String;

/// Marks the beginning of a learned token sequence.
pub const START_TOKEN: &str = "<s>";

/// Marks the end of a learned token sequence.
pub const END_TOKEN: &str = "</s>";

/// Persisted keys for one channel. Every key is derived from the channel id,
/// so two channels never share state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKeys {
    /// Conversation history (`chat:<id>`).
    pub chat: String,
    /// Markov model (`markov:<id>`).
    pub markov: String,
    /// Knowledge graph triples (`kg:<id>`).
    pub knowledge: String,
    /// Replies already used from no-repeat topics (`jokes:<id>`).
    pub used_jokes: String,
}

impl ChannelKeys {
    pub fn for_channel(channel: &str) -> Self {
        Self {
            chat: format!("chat:{channel}"),
            markov: format!("markov:{channel}"),
            knowledge: format!("kg:{channel}"),
            used_jokes: format!("jokes:{channel}"),
        }
    }

    /// All keys cleared by a channel reset.
    pub fn all(&self) -> [&str; 4] {
        [
            self.chat.as_str(),
            self.markov.as_str(),
            self.knowledge.as_str(),
            self.used_jokes.as_str(),
        ]
    }
}

/// A subject–predicate–object fact extracted from user text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Render as a plain sentence: `subject predicate object`.
    pub fn render(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// One gram of the markov model and the tokens observed after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkovEntry {
    /// Gram tokens joined with a single space.
    pub gram: String,
    /// Following tokens in first-seen order. Counts only ever increase.
    #[serde(default)]
    pub next: Vec<NextToken>,
}

/// A token that followed a gram, with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextToken {
    pub token: String,
    pub count: u64,
}

impl MarkovEntry {
    pub fn new(gram: impl Into<String>) -> Self {
        Self {
            gram: gram.into(),
            next: Vec::new(),
        }
    }

    /// Record one more occurrence of `token` after this gram.
    pub fn increment(&mut self, token: &str) {
        match self.next.iter_mut().find(|n| n.token == token) {
            Some(existing) => existing.count += 1,
            None => self.next.push(NextToken {
                token: token.to_string(),
                count: 1,
            }),
        }
    }

    /// Occurrence count of `token` after this gram.
    pub fn count(&self, token: &str) -> Option<u64> {
        self.next.iter().find(|n| n.token == token).map(|n| n.count)
    }

    /// Sum of all following-token counts.
    pub fn total(&self) -> u64 {
        self.next.iter().map(|n| n.count).sum()
    }

    /// The gram split back into tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.gram.split(' ')
    }
}
