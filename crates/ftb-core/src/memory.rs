use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::domain::ChatId;

const SHARDS: usize = 16;

/// Process-wide rolling conversation history, keyed by chat.
///
/// Entries are opaque formatted strings; callers decide the role tags. State
/// is in-memory only and lost on restart. Shard locks are never held across
/// an await, so operations on one chat are linearizable while different
/// shards never contend.
pub struct ConversationMemory {
    shards: Vec<Mutex<HashMap<i64, VecDeque<String>>>>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, chat_id: ChatId) -> &Mutex<HashMap<i64, VecDeque<String>>> {
        &self.shards[(chat_id.0 as u64 % self.shards.len() as u64) as usize]
    }

    /// Last `n` entries for the chat, oldest first; empty if the chat is
    /// unseen.
    pub fn get_recent(&self, chat_id: ChatId, n: usize) -> Vec<String> {
        let map = self.shard(chat_id).lock();
        let Some(history) = map.get(&chat_id.0) else {
            return Vec::new();
        };
        history
            .iter()
            .skip(history.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    /// Append `entries` in order, then drop from the front down to `cap`.
    pub fn append_and_trim<I>(&self, chat_id: ChatId, entries: I, cap: usize)
    where
        I: IntoIterator<Item = String>,
    {
        let mut map = self.shard(chat_id).lock();
        let history = map.entry(chat_id.0).or_default();
        history.extend(entries);
        while history.len() > cap {
            history.pop_front();
        }
    }

    /// Forget the chat entirely. No-op for unseen chats.
    pub fn reset(&self, chat_id: ChatId) {
        self.shard(chat_id).lock().remove(&chat_id.0);
    }
}
