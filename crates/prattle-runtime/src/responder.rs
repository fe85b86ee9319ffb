use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use prattle_config::PrattleConfig;
use prattle_core::{ChannelKeys, MessageRecord, Result, Role, Tokenizer, Triple};
use prattle_memory::store::{load_sequence, push_item, save_sequence};
use prattle_memory::{
    ChannelMap, KeyValueStore, KnowledgeExtractor, KnowledgeGraph, MarkovChain, SemanticMatcher,
    WorkingMemory,
};
use prattle_services::{
    HttpSearchService, LexiconSentiment, NoopSearch, Sentiment, SentimentReport,
    SentimentService, Snippet, WebSearch,
};

use crate::locks::ChannelLocks;
use crate::ranking::{RankedResponse, ResponseRanking};
use crate::rules::{RuleSet, pick_one, pick_topic_reply};

/// Used only when the configured fallback list is empty.
const LAST_RESORT_REPLY: &str = "Hmm, I'm not sure what to say 🤔";

const MAX_RANKING_AGE_HOURS: u64 = 24 * 365 * 100;

/// Source tag for knowledge replies fed into the ranking.
const KNOWLEDGE_SOURCE: &str = "knowledge";

/// A cascade stage, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sensitive,
    Insult,
    Forbidden,
    Faq,
    Topic,
    Knowledge,
    FollowUp,
    Sentiment,
    Search,
    Ranked,
    Markov,
    Semantic,
    Fallback,
}

impl Stage {
    /// Guards run before anything is learned from the message.
    pub const GUARDS: [Stage; 3] = [Stage::Sensitive, Stage::Insult, Stage::Forbidden];

    /// Stages tried after learning. The fallback always answers.
    pub const CASCADE: [Stage; 10] = [
        Stage::Faq,
        Stage::Topic,
        Stage::Knowledge,
        Stage::FollowUp,
        Stage::Sentiment,
        Stage::Search,
        Stage::Ranked,
        Stage::Markov,
        Stage::Semantic,
        Stage::Fallback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Sensitive => "sensitive",
            Stage::Insult => "insult",
            Stage::Forbidden => "forbidden",
            Stage::Faq => "faq",
            Stage::Topic => "topic",
            Stage::Knowledge => "knowledge",
            Stage::FollowUp => "follow_up",
            Stage::Sentiment => "sentiment",
            Stage::Search => "search",
            Stage::Ranked => "ranked",
            Stage::Markov => "markov",
            Stage::Semantic => "semantic",
            Stage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reply and the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub stage: Stage,
}

/// Everything the stages need to know about the current message.
struct Turn<'a> {
    channel: &'a str,
    keys: &'a ChannelKeys,
    text: &'a str,
    words: Vec<String>,
    tokens: Vec<String>,
    sentiment: SentimentReport,
}

/// The response cascade for every channel.
///
/// One responder serves all channels; per-channel state lives in the store
/// (history, markov model, knowledge graph, used jokes) and in memory
/// (short-term replies, ranking). Messages on one channel are handled one at
/// a time.
pub struct Responder {
    config: PrattleConfig,
    store: Arc<dyn KeyValueStore>,
    tokenizer: Tokenizer,
    rules: RuleSet,
    knowledge: KnowledgeGraph,
    markov: MarkovChain,
    matcher: SemanticMatcher,
    search: Arc<dyn WebSearch>,
    sentiment: Arc<dyn SentimentService>,
    working: Mutex<WorkingMemory>,
    rankings: Mutex<ChannelMap<ResponseRanking>>,
    locks: ChannelLocks,
    rng: Mutex<StdRng>,
}

impl Responder {
    /// Compile the lexicon and wire up the default collaborators: HTTP search
    /// when `[search].enabled`, and the lexicon sentiment scorer.
    pub fn new(config: PrattleConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let lexicon = &config.lexicon;
        let tokenizer = Tokenizer::new(lexicon.stopwords.iter());
        let rules = RuleSet::from_lexicon(lexicon)?;
        let extractor = KnowledgeExtractor::from_patterns(&lexicon.knowledge_patterns)?;
        let knowledge = KnowledgeGraph::new(Arc::clone(&store), extractor, tokenizer.clone());
        let markov = MarkovChain::new(Arc::clone(&store), config.markov.clone());
        let matcher = SemanticMatcher::new(config.semantic.threshold);

        let search: Arc<dyn WebSearch> = if config.search.enabled {
            Arc::new(HttpSearchService::new(&config.search)?)
        } else {
            Arc::new(NoopSearch)
        };
        let sentiment = Arc::new(LexiconSentiment::from_lexicon(&lexicon.sentiment));

        let rng = match config.responder.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            search = search.name(),
            markov_order = config.markov.order,
            "responder ready"
        );

        Ok(Self {
            working: Mutex::new(WorkingMemory::new(
                config.memory.short_term_capacity,
                config.memory.max_active_channels,
            )),
            rankings: Mutex::new(ChannelMap::new(config.memory.max_active_channels)),
            locks: ChannelLocks::new(),
            rng: Mutex::new(rng),
            config,
            store,
            tokenizer,
            rules,
            knowledge,
            markov,
            matcher,
            search,
            sentiment,
        })
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentService>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_rng_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &PrattleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Answer one message. Always returns a non-empty reply.
    pub async fn handle_message(&self, channel: &str, text: &str, user_id: Option<&str>) -> String {
        self.respond(channel, text, user_id).await.text
    }

    /// [`handle_message`](Self::handle_message), also reporting which stage answered.
    pub async fn respond(&self, channel: &str, text: &str, user_id: Option<&str>) -> Reply {
        let _guard = self.locks.lock(channel).await;
        let keys = ChannelKeys::for_channel(channel);
        debug!(channel, user = user_id.unwrap_or("-"), "handling message");

        if let Err(e) = self.ensure_history(&keys).await {
            warn!(channel, error = %e, "could not seed conversation history");
        }
        if let Err(e) = push_item(self.store.as_ref(), &keys.chat, &MessageRecord::user(text)).await {
            warn!(channel, error = %e, "could not record user message");
        }

        let reply = self.cascade(channel, &keys, text).await;
        self.accept(channel, &keys, &reply.text).await;
        info!(channel, stage = %reply.stage, "replied");
        reply
    }

    /// Forget everything about a channel and reseed the system prompt.
    pub async fn reset(&self, channel: &str) -> Result<()> {
        let _guard = self.locks.lock(channel).await;
        let keys = ChannelKeys::for_channel(channel);
        for key in keys.all() {
            self.store.delete(key).await?;
        }
        self.working.lock().clear(channel);
        self.rankings.lock().remove(channel);
        push_item(self.store.as_ref(), &keys.chat, &self.system_record()).await?;
        info!(channel, "channel reset");
        Ok(())
    }

    /// The persisted conversation, system prompt first.
    pub async fn history(&self, channel: &str) -> Result<Vec<MessageRecord>> {
        let keys = ChannelKeys::for_channel(channel);
        load_sequence(self.store.as_ref(), &keys.chat).await
    }

    /// Recent accepted replies held in short-term memory, oldest first.
    pub fn short_term(&self, channel: &str) -> Vec<String> {
        self.working.lock().snapshot(channel)
    }

    /// The channel's `k` best ranked candidates.
    pub fn top_ranked(&self, channel: &str, k: usize) -> Vec<RankedResponse> {
        self.rankings
            .lock()
            .get(channel)
            .map(|r| r.get_top(k).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    fn system_record(&self) -> MessageRecord {
        MessageRecord::system(self.config.responder.system_prompt.clone())
    }

    async fn ensure_history(&self, keys: &ChannelKeys) -> Result<()> {
        let history: Vec<MessageRecord> = load_sequence(self.store.as_ref(), &keys.chat).await?;
        match history.first() {
            Some(first) if first.role == Role::System => Ok(()),
            Some(_) => {
                let mut seeded = Vec::with_capacity(history.len() + 1);
                seeded.push(self.system_record());
                seeded.extend(history);
                save_sequence(self.store.as_ref(), &keys.chat, &seeded).await
            }
            None => push_item(self.store.as_ref(), &keys.chat, &self.system_record()).await,
        }
    }

    async fn cascade(&self, channel: &str, keys: &ChannelKeys, text: &str) -> Reply {
        let turn = Turn {
            channel,
            keys,
            text,
            words: self.tokenizer.words(text),
            tokens: self.tokenizer.tokenize(text),
            sentiment: self.sentiment.analyze(text),
        };

        for stage in Stage::GUARDS {
            if let Some(reply) = self.attempt(stage, &turn).await {
                return reply;
            }
        }

        self.learn(&turn).await;

        for stage in Stage::CASCADE {
            if let Some(reply) = self.attempt(stage, &turn).await {
                return reply;
            }
        }

        Reply {
            text: LAST_RESORT_REPLY.to_string(),
            stage: Stage::Fallback,
        }
    }

    /// Run one stage; errors and blank replies move the cascade on.
    async fn attempt(&self, stage: Stage, turn: &Turn<'_>) -> Option<Reply> {
        match self.run_stage(stage, turn).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(Reply { text, stage }),
            Ok(_) => None,
            Err(e) => {
                warn!(channel = turn.channel, stage = %stage, error = %e, "stage failed, skipping");
                None
            }
        }
    }

    async fn run_stage(&self, stage: Stage, turn: &Turn<'_>) -> Result<Option<String>> {
        let owned = |s: Option<&str>| s.map(String::from);
        match stage {
            Stage::Sensitive => Ok(owned(self.rules.sensitive.check(turn.text))),
            Stage::Insult => Ok(owned(self.rules.insults.check(turn.text))),
            Stage::Forbidden => Ok(owned(self.rules.forbidden.check(turn.text))),
            Stage::Faq => Ok(owned(self.rules.faq(turn.text))),
            Stage::Topic => self.topic_reply(turn).await,
            Stage::Knowledge => self.knowledge_reply(turn).await,
            Stage::FollowUp => Ok(self.rules.follow_up(turn.text)),
            Stage::Sentiment => Ok(self.sentiment_reply(&turn.sentiment)),
            Stage::Search => Ok(self.search_reply(turn).await),
            Stage::Ranked => Ok(self.ranked_reply(turn)),
            Stage::Markov => self.markov_reply(turn).await,
            Stage::Semantic => self.semantic_reply(turn).await,
            Stage::Fallback => Ok(Some(self.fallback_reply())),
        }
    }

    /// Questions feed the markov model but never become facts, so
    /// "what is X" is not stored as a triple about "what".
    async fn learn(&self, turn: &Turn<'_>) {
        if let Err(e) = self.markov.learn(turn.channel, &turn.words).await {
            warn!(channel = turn.channel, error = %e, "markov learning failed");
        }
        if turn.sentiment.question {
            debug!(channel = turn.channel, "question, no facts extracted");
            return;
        }
        if let Err(e) = self.knowledge.add_knowledge(turn.channel, turn.text).await {
            warn!(channel = turn.channel, error = %e, "knowledge learning failed");
        }
    }

    async fn learn_snippets(&self, channel: &str, snippets: &[Snippet]) {
        let mut facts = 0;
        for snippet in snippets {
            let words = self.tokenizer.words(&snippet.text);
            if let Err(e) = self.markov.learn(channel, &words).await {
                warn!(channel, source = %snippet.source, error = %e, "markov learning from search failed");
            }
            match self.knowledge.add_knowledge(channel, &snippet.text).await {
                Ok(added) => facts += added.len(),
                Err(e) => {
                    warn!(channel, source = %snippet.source, error = %e, "knowledge learning from search failed")
                }
            }
        }
        debug!(channel, snippets = snippets.len(), facts, "learned from search results");
    }

    async fn accept(&self, channel: &str, keys: &ChannelKeys, reply: &str) {
        let record = MessageRecord::assistant(reply);
        if let Err(e) = push_item(self.store.as_ref(), &keys.chat, &record).await {
            warn!(channel, error = %e, "could not record reply");
        }
        self.working.lock().channel(channel).push(reply);
    }

    // ── Stages ─────────────────────────────────────────────────

    async fn topic_reply(&self, turn: &Turn<'_>) -> Result<Option<String>> {
        let Some(topic) = self.rules.topic(&turn.words) else {
            return Ok(None);
        };

        if !topic.no_repeat {
            let mut rng = self.rng.lock();
            return Ok(pick_topic_reply(topic, &[], &mut *rng).map(|p| p.reply));
        }

        let key = &turn.keys.used_jokes;
        let used: Vec<String> = load_sequence(self.store.as_ref(), key)
            .await
            .unwrap_or_else(|e| {
                warn!(channel = turn.channel, error = %e, "used replies unavailable");
                Vec::new()
            });

        let pick = {
            let mut rng = self.rng.lock();
            pick_topic_reply(topic, &used, &mut *rng)
        };
        let Some(pick) = pick else {
            return Ok(None);
        };

        let saved = if pick.recycled {
            save_sequence(self.store.as_ref(), key, std::slice::from_ref(&pick.reply)).await
        } else {
            push_item(self.store.as_ref(), key, &pick.reply).await
        };
        if let Err(e) = saved {
            warn!(channel = turn.channel, error = %e, "could not record used reply");
        }
        debug!(channel = turn.channel, topic = %topic.name, recycled = pick.recycled, "topic reply");
        Ok(Some(pick.reply))
    }

    async fn knowledge_reply(&self, turn: &Turn<'_>) -> Result<Option<String>> {
        let matches = self
            .knowledge
            .query_knowledge(turn.channel, turn.text, None)
            .await?;
        if matches.is_empty() {
            return Ok(None);
        }

        let reply = matches
            .iter()
            .take(self.config.responder.knowledge_results.max(1))
            .map(Triple::render)
            .collect::<Vec<_>>()
            .join(&self.config.responder.knowledge_separator);
        self.rank(turn.channel, &reply, Some(KNOWLEDGE_SOURCE), &turn.tokens);
        Ok(Some(reply))
    }

    fn sentiment_reply(&self, report: &SentimentReport) -> Option<String> {
        let responses = &self.config.lexicon.sentiment_responses;
        let pool = match report.sentiment {
            Sentiment::Negative => &responses.negative,
            Sentiment::Positive if report.excited && !responses.excited.is_empty() => {
                &responses.excited
            }
            Sentiment::Positive => &responses.positive,
            Sentiment::Neutral | Sentiment::Question => return None,
        };
        let mut rng = self.rng.lock();
        pick_one(pool, &mut *rng).map(String::from)
    }

    async fn search_reply(&self, turn: &Turn<'_>) -> Option<String> {
        if !turn.sentiment.question {
            return None;
        }
        let snippets = self.search.search_web(turn.text).await;
        let first = snippets.first()?;

        for snippet in &snippets {
            self.rank(turn.channel, &snippet.text, Some(snippet.source.as_str()), &turn.tokens);
        }
        if self.config.search.learn_from_results {
            self.learn_snippets(turn.channel, &snippets).await;
        }

        let quoted: String = first
            .text
            .chars()
            .take(self.config.search.max_reply_chars)
            .collect();
        Some(format!("{}{}", self.config.search.reply_prefix, quoted.trim()))
    }

    fn ranked_reply(&self, turn: &Turn<'_>) -> Option<String> {
        let mut rankings = self.rankings.lock();
        let ranking = rankings.get_mut(turn.channel)?;
        // Capped at a century to stay inside chrono's range
        let hours = self.config.ranking.max_age_hours.min(MAX_RANKING_AGE_HOURS) as i64;
        let max_age = Duration::hours(hours);
        let pruned = ranking.prune_older_than(max_age, Utc::now());
        if pruned > 0 {
            debug!(channel = turn.channel, pruned, "stale ranked replies dropped");
        }
        ranking.best_match(&turn.tokens).map(|entry| entry.text.clone())
    }

    async fn markov_reply(&self, turn: &Turn<'_>) -> Result<Option<String>> {
        let model = self.markov.load(turn.channel).await?;
        let mut rng = self.rng.lock();
        Ok(model.generate(&turn.tokens, self.markov.config(), &mut *rng))
    }

    async fn semantic_reply(&self, turn: &Turn<'_>) -> Result<Option<String>> {
        let history: Vec<MessageRecord> =
            load_sequence(self.store.as_ref(), &turn.keys.chat).await?;
        let mut candidates: Vec<String> = history
            .into_iter()
            .filter(MessageRecord::is_assistant)
            .map(|m| m.content)
            .collect();

        if self.config.semantic.use_short_term {
            let recent = self.working.lock().snapshot(turn.channel);
            for reply in recent {
                if !candidates.contains(&reply) {
                    candidates.push(reply);
                }
            }
        }

        let best = self.matcher.find_best(
            &turn.tokens,
            candidates
                .iter()
                .map(|c| (c.as_str(), self.tokenizer.tokenize(c))),
        );
        if let Some((_, score)) = best {
            debug!(channel = turn.channel, score, "semantic match");
        }
        Ok(best.map(|(reply, _)| reply.to_string()))
    }

    fn fallback_reply(&self) -> String {
        let mut rng = self.rng.lock();
        pick_one(&self.config.responder.fallback_responses, &mut *rng)
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(LAST_RESORT_REPLY)
            .to_string()
    }

    fn rank(&self, channel: &str, text: &str, source: Option<&str>, query_tokens: &[String]) {
        let mut rankings = self.rankings.lock();
        rankings
            .get_or_insert_with(channel, || {
                ResponseRanking::new(self.config.ranking.clone(), &self.config.lexicon)
            })
            .add(text, source, query_tokens);
    }
}
