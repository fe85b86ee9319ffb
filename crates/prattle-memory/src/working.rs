use std::collections::{HashMap, VecDeque};

use tracing::debug;

use prattle_core::ChannelId;

/// Bounded buffer of the most recent accepted replies for one channel.
///
/// Lives in RAM only; it is not restored after a restart.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    capacity: usize,
    entries: VecDeque<String>,
}

impl ShortTermMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Record a reply, evicting the oldest when full.
    pub fn push(&mut self, reply: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(reply.into());
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn contains(&self, reply: &str) -> bool {
        self.entries.iter().any(|e| e == reply)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-channel values with a bound on the number of channels.
///
/// Reading through [`get_mut`](Self::get_mut) or
/// [`get_or_insert_with`](Self::get_or_insert_with) marks a channel as used.
/// Inserting a new channel at the limit evicts the least recently used one.
pub struct ChannelMap<T> {
    max_channels: usize,
    tick: u64,
    entries: HashMap<ChannelId, (T, u64)>,
}

impl<T> ChannelMap<T> {
    pub fn new(max_channels: usize) -> Self {
        Self {
            max_channels: max_channels.max(1),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look at a channel's value without marking it used.
    pub fn get(&self, channel: &str) -> Option<&T> {
        self.entries.get(channel).map(|(value, _)| value)
    }

    pub fn get_mut(&mut self, channel: &str) -> Option<&mut T> {
        let tick = self.next_tick();
        self.entries.get_mut(channel).map(|slot| {
            slot.1 = tick;
            &mut slot.0
        })
    }

    pub fn get_or_insert_with(&mut self, channel: &str, make: impl FnOnce() -> T) -> &mut T {
        let tick = self.next_tick();
        if !self.entries.contains_key(channel) && self.entries.len() >= self.max_channels {
            self.evict_least_recent();
        }
        let slot = self
            .entries
            .entry(channel.to_string())
            .or_insert_with(|| (make(), tick));
        slot.1 = tick;
        &mut slot.0
    }

    pub fn remove(&mut self, channel: &str) -> Option<T> {
        self.entries.remove(channel).map(|(value, _)| value)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, used))| *used)
            .map(|(channel, _)| channel.clone());
        if let Some(channel) = oldest {
            self.entries.remove(&channel);
            debug!(channel = %channel, "evicted idle channel");
        }
    }
}

/// Short-term memories for every active channel.
pub struct WorkingMemory {
    capacity: usize,
    channels: ChannelMap<ShortTermMemory>,
}

impl WorkingMemory {
    /// `capacity` replies per channel, at most `max_channels` channels.
    pub fn new(capacity: usize, max_channels: usize) -> Self {
        Self {
            capacity,
            channels: ChannelMap::new(max_channels),
        }
    }

    /// Get or create the memory for a channel.
    pub fn channel(&mut self, channel: &str) -> &mut ShortTermMemory {
        let capacity = self.capacity;
        self.channels
            .get_or_insert_with(channel, || ShortTermMemory::new(capacity))
    }

    /// Snapshot of a channel's replies, oldest first.
    pub fn snapshot(&self, channel: &str) -> Vec<String> {
        self.channels
            .get(channel)
            .map(|stm| stm.entries().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Drop a channel's memory entirely.
    pub fn clear(&mut self, channel: &str) {
        self.channels.remove(channel);
    }

    pub fn active_channels(&self) -> usize {
        self.channels.len()
    }
}
