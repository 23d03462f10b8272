//! Conversation history stores.
//!
//! The router owns one [`HistoryStore`] and hands personas the most recent
//! turns of a conversation. The default store, [`DisabledHistory`], records
//! nothing, so personas always see an empty history. [`InMemoryHistory`]
//! keeps turns per conversation id behind a single mutex; every reader and
//! writer goes through that lock, so concurrent requests on the same
//! conversation are serialized.
//!
//! Both dimensions are bounded: each conversation keeps its most recent
//! turns, and once the store holds `max_conversations` conversations, a new
//! one evicts the conversation whose last turn is oldest.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::config::HistoryConfig;
use crate::models::ConversationTurn;

pub trait HistoryStore: Send + Sync {
    fn append_turn(&self, turn: ConversationTurn);

    /// Up to `limit` most recent turns, oldest first.
    fn recent_turns(&self, conversation_id: &str, limit: usize) -> Vec<ConversationTurn>;
}

/// Records nothing.
#[derive(Debug, Default)]
pub struct DisabledHistory;

impl HistoryStore for DisabledHistory {
    fn append_turn(&self, _turn: ConversationTurn) {}

    fn recent_turns(&self, _conversation_id: &str, _limit: usize) -> Vec<ConversationTurn> {
        Vec::new()
    }
}

/// Default number of conversations kept by [`InMemoryHistory::new`].
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

/// Process-local history, bounded per conversation and in conversations.
#[derive(Debug)]
pub struct InMemoryHistory {
    max_per_conversation: usize,
    max_conversations: usize,
    turns: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryHistory {
    pub fn new(max_per_conversation: usize) -> Self {
        Self::with_limits(max_per_conversation, DEFAULT_MAX_CONVERSATIONS)
    }

    pub fn with_limits(max_per_conversation: usize, max_conversations: usize) -> Self {
        Self {
            max_per_conversation: max_per_conversation.max(1),
            max_conversations: max_conversations.max(1),
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl HistoryStore for InMemoryHistory {
    fn append_turn(&self, turn: ConversationTurn) {
        let mut turns = match self.turns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !turns.contains_key(&turn.conversation_id) && turns.len() >= self.max_conversations {
            evict_stalest(&mut turns);
        }
        let entry = turns.entry(turn.conversation_id.clone()).or_default();
        entry.push(turn);
        if entry.len() > self.max_per_conversation {
            let excess = entry.len() - self.max_per_conversation;
            entry.drain(..excess);
        }
    }

    fn recent_turns(&self, conversation_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let turns = match self.turns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match turns.get(conversation_id) {
            Some(entry) => {
                let skip = entry.len().saturating_sub(limit);
                entry[skip..].to_vec()
            }
            None => Vec::new(),
        }
    }
}

/// Drop the conversation whose most recent turn is the oldest.
fn evict_stalest(turns: &mut HashMap<String, Vec<ConversationTurn>>) {
    let stalest = turns
        .iter()
        .min_by_key(|(_, entry)| entry.last().map(|t| t.at))
        .map(|(id, _)| id.clone());
    if let Some(id) = stalest {
        debug!(conversation_id = %id, "evicting stalest conversation");
        turns.remove(&id);
    }
}

/// Build the store selected by `[history]`.
pub fn from_config(config: &HistoryConfig) -> Box<dyn HistoryStore> {
    if config.enabled {
        // Keep both sides of each exchange for `max_turns` exchanges.
        Box::new(InMemoryHistory::with_limits(
            config.max_turns * 2,
            config.max_conversations,
        ))
    } else {
        Box::new(DisabledHistory)
    }
}
