use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use prattle_config::schema::{MarkovConfig, Selection, StartStrategy};
use prattle_core::{ChannelKeys, END_TOKEN, MarkovEntry, Result, START_TOKEN};

use crate::store::{KeyValueStore, load_sequence, save_sequence};

fn is_sentinel(token: &str) -> bool {
    token == START_TOKEN || token == END_TOKEN
}

/// An order-N markov model held entirely in memory.
///
/// Entries keep first-seen order so greedy generation is deterministic.
#[derive(Debug, Clone, Default)]
pub struct MarkovModel {
    entries: Vec<MarkovEntry>,
}

impl MarkovModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<MarkovEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MarkovEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MarkovEntry> {
        self.entries
    }

    pub fn get(&self, gram: &str) -> Option<&MarkovEntry> {
        self.entries.iter().find(|e| e.gram == gram)
    }

    /// Learn one token sequence, framed by the start and end sentinels.
    pub fn learn(&mut self, tokens: &[String], order: usize) {
        if tokens.is_empty() || order == 0 {
            return;
        }

        let mut framed = Vec::with_capacity(tokens.len() + 2);
        framed.push(START_TOKEN);
        framed.extend(tokens.iter().map(String::as_str));
        framed.push(END_TOKEN);

        for window in framed.windows(order + 1) {
            let gram = window[..order].join(" ");
            let next = window[order];
            match self.entries.iter_mut().find(|e| e.gram == gram) {
                Some(entry) => entry.increment(next),
                None => {
                    let mut entry = MarkovEntry::new(gram);
                    entry.increment(next);
                    self.entries.push(entry);
                }
            }
        }
    }

    /// Walk the chain from a gram related to `input_tokens`.
    ///
    /// Returns `None` when no start gram exists or the walk produced fewer
    /// than `min_tokens` tokens.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        input_tokens: &[String],
        config: &MarkovConfig,
        rng: &mut R,
    ) -> Option<String> {
        let start = self.pick_start(input_tokens, config.start, rng)?;

        let mut window: Vec<String> = start.tokens().map(String::from).collect();
        let mut output: Vec<String> = window
            .iter()
            .filter(|t| !is_sentinel(t))
            .cloned()
            .collect();

        for _ in 0..config.max_steps {
            if output.len() >= config.max_tokens {
                break;
            }
            let Some(entry) = self.get(&window.join(" ")) else {
                break;
            };
            let Some(next) = Self::choose(entry, config.selection, rng) else {
                break;
            };
            if next == END_TOKEN {
                break;
            }
            output.push(next.to_string());
            window.remove(0);
            window.push(next.to_string());
        }

        if output.len() >= config.min_tokens {
            Some(output.join(" "))
        } else {
            None
        }
    }

    fn pick_start<R: Rng + ?Sized>(
        &self,
        input_tokens: &[String],
        strategy: StartStrategy,
        rng: &mut R,
    ) -> Option<&MarkovEntry> {
        let related: Vec<&MarkovEntry> = self
            .entries
            .iter()
            .filter(|e| {
                e.tokens()
                    .any(|t| !is_sentinel(t) && input_tokens.iter().any(|i| i == t))
            })
            .collect();

        let candidates = if related.is_empty() {
            self.entries
                .iter()
                .filter(|e| e.tokens().next() == Some(START_TOKEN))
                .collect()
        } else {
            related
        };

        if candidates.is_empty() {
            return None;
        }
        match strategy {
            StartStrategy::First => candidates.first().copied(),
            StartStrategy::Random => Some(candidates[rng.gen_range(0..candidates.len())]),
        }
    }

    fn choose<'a, R: Rng + ?Sized>(
        entry: &'a MarkovEntry,
        selection: Selection,
        rng: &mut R,
    ) -> Option<&'a str> {
        match selection {
            Selection::Greedy => {
                // Strict comparison keeps the first-seen token on ties
                let mut best: Option<&prattle_core::NextToken> = None;
                for candidate in &entry.next {
                    if best.is_none_or(|b| candidate.count > b.count) {
                        best = Some(candidate);
                    }
                }
                best.map(|n| n.token.as_str())
            }
            Selection::Weighted => {
                let total = entry.total();
                if total == 0 {
                    return None;
                }
                let mut roll = rng.gen_range(0..total);
                for candidate in &entry.next {
                    if roll < candidate.count {
                        return Some(candidate.token.as_str());
                    }
                    roll -= candidate.count;
                }
                None
            }
        }
    }
}

/// Persisted per-channel markov chains.
///
/// Each learn call reads the whole model, updates it, and writes it back;
/// callers serialize access per channel.
pub struct MarkovChain {
    store: Arc<dyn KeyValueStore>,
    config: MarkovConfig,
}

impl MarkovChain {
    pub fn new(store: Arc<dyn KeyValueStore>, config: MarkovConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MarkovConfig {
        &self.config
    }

    pub async fn load(&self, channel: &str) -> Result<MarkovModel> {
        let key = ChannelKeys::for_channel(channel).markov;
        let entries = load_sequence(self.store.as_ref(), &key).await?;
        Ok(MarkovModel::from_entries(entries))
    }

    pub async fn learn(&self, channel: &str, tokens: &[String]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        let mut model = self.load(channel).await?;
        model.learn(tokens, self.config.order);
        let key = ChannelKeys::for_channel(channel).markov;
        save_sequence(self.store.as_ref(), &key, model.entries()).await?;
        debug!(channel, grams = model.entries().len(), "markov model updated");
        Ok(())
    }

    pub async fn generate<R: Rng + ?Sized>(
        &self,
        channel: &str,
        input_tokens: &[String],
        rng: &mut R,
    ) -> Result<Option<String>> {
        let model = self.load(channel).await?;
        Ok(model.generate(input_tokens, &self.config, rng))
    }
}
