use std::collections::HashMap;

use tracing::debug;

use super::conversation_state::{ConversationState, MergeOutcome};
use crate::entities::{ConversationKey, Message};

/// Every open conversation's state, keyed by conversation.
///
/// Task and room conversations share this one store; only open
/// conversations accept confirmed records, so late acks for a closed
/// conversation fall through as [`MergeOutcome::Ignored`].
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationKey, ConversationState>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a conversation; an already open one keeps its messages.
    pub fn open(&mut self, key: ConversationKey) -> &mut ConversationState {
        self.conversations.entry(key.clone()).or_insert_with(|| {
            debug!(conversation = %key, "opened conversation state");
            ConversationState::new(key)
        })
    }

    /// Drop a conversation's state.
    pub fn close(&mut self, key: &ConversationKey) -> Option<ConversationState> {
        let closed = self.conversations.remove(key);
        if closed.is_some() {
            debug!(conversation = %key, "closed conversation state");
        }
        closed
    }

    pub fn is_open(&self, key: &ConversationKey) -> bool {
        self.conversations.contains_key(key)
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&ConversationState> {
        self.conversations.get(key)
    }

    pub fn get_mut(&mut self, key: &ConversationKey) -> Option<&mut ConversationState> {
        self.conversations.get_mut(key)
    }

    /// Route a confirmed record to its conversation.
    pub fn merge_confirmed(&mut self, record: Message) -> MergeOutcome {
        match self.conversations.get_mut(&record.conversation) {
            Some(state) => state.merge_confirmed(record),
            None => MergeOutcome::Ignored,
        }
    }

    pub fn open_keys(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<_> = self.conversations.keys().cloned().collect();
        keys.sort();
        keys
    }
}
