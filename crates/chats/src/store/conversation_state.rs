use tracing::debug;

use crate::entities::{ConversationKey, DeliveryState, Message};
use crate::types::{ChatError, ChatResult};

/// What [`ConversationState::merge_confirmed`] did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A pending entry with the same tempId was replaced; `index` is its final position
    Replaced { index: usize },
    /// The record was new and inserted at `index`
    Inserted { index: usize },
    /// The record was already listed; its leftover pending entry was removed
    PendingDropped,
    /// An entry with the same permanent id already exists
    Duplicate,
    /// The record belongs to another conversation or carries no permanent id
    Ignored,
}

impl MergeOutcome {
    /// Whether the visible list changed.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            MergeOutcome::Replaced { .. } | MergeOutcome::Inserted { .. } | MergeOutcome::PendingDropped
        )
    }
}

/// Ordered message list of one conversation.
///
/// Messages are kept in ascending `created_at` order; equal timestamps keep
/// their insertion order.
#[derive(Debug, Clone)]
pub struct ConversationState {
    key: ConversationKey,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(key: ConversationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.position_of_id(message_id).map(|idx| &self.messages[idx])
    }

    fn position_of_id(&self, message_id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|message| message.id() == Some(message_id))
    }

    fn position_of_pending(&self, temp_id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|message| message.is_pending() && message.temp_id() == Some(temp_id))
    }

    /// Sort by timestamp and return the new position of the entry matching `locate`.
    fn settle(&mut self, locate: impl Fn(&Message) -> bool) -> usize {
        self.messages.sort_by_key(|message| message.created_at);
        self.messages
            .iter()
            .position(locate)
            .unwrap_or(self.messages.len().saturating_sub(1))
    }

    /// Insert the optimistic entry for a message being sent.
    pub fn insert_pending(&mut self, message: Message) -> ChatResult<usize> {
        if message.conversation != self.key {
            return Err(ChatError::validation(format!(
                "message for {} cannot be added to {}",
                message.conversation, self.key
            )));
        }
        if !message.is_pending() {
            return Err(ChatError::validation("pending messages cannot carry a permanent id"));
        }
        let temp_id = message
            .temp_id
            .clone()
            .ok_or_else(|| ChatError::validation("pending messages need a tempId"))?;
        if self.position_of_pending(&temp_id).is_some() {
            return Err(ChatError::validation(format!(
                "tempId {} is already pending",
                temp_id
            )));
        }

        self.messages.push(message);
        let index = self.settle(|m| m.is_pending() && m.temp_id() == Some(temp_id.as_str()));
        debug!(conversation = %self.key, temp_id = %temp_id, index, "inserted pending message");
        Ok(index)
    }

    /// Merge a server-confirmed record.
    ///
    /// A pending entry with the same tempId is replaced in place; a record
    /// whose permanent id is already listed is dropped; anything else is
    /// inserted. Acks, broadcasts, and history pages all go through here.
    pub fn merge_confirmed(&mut self, record: Message) -> MergeOutcome {
        if record.conversation != self.key {
            debug!(conversation = %self.key, other = %record.conversation, "ignoring record for another conversation");
            return MergeOutcome::Ignored;
        }
        let Some(id) = record.id.clone() else {
            debug!(conversation = %self.key, "ignoring record without a permanent id");
            return MergeOutcome::Ignored;
        };

        let existing = self.position_of_id(&id);
        let pending = record
            .temp_id()
            .and_then(|temp_id| self.position_of_pending(temp_id));

        match (pending, existing) {
            (Some(pending_idx), None) => {
                self.messages[pending_idx] = record;
                let index = self.settle(|m| m.id() == Some(id.as_str()));
                debug!(conversation = %self.key, message_id = %id, index, "replaced pending message");
                MergeOutcome::Replaced { index }
            }
            (Some(pending_idx), Some(_)) => {
                // Confirmed twice through different paths; keep the listed record.
                self.messages.remove(pending_idx);
                debug!(conversation = %self.key, message_id = %id, "dropped pending entry of a listed record");
                MergeOutcome::PendingDropped
            }
            (None, Some(_)) => {
                debug!(conversation = %self.key, message_id = %id, "dropping duplicate delivery");
                MergeOutcome::Duplicate
            }
            (None, None) => {
                self.messages.push(record);
                let index = self.settle(|m| m.id() == Some(id.as_str()));
                debug!(conversation = %self.key, message_id = %id, index, "inserted confirmed message");
                MergeOutcome::Inserted { index }
            }
        }
    }

    /// Merge a fetched history page; returns how many entries were added or replaced.
    pub fn load_history(&mut self, records: impl IntoIterator<Item = Message>) -> usize {
        records
            .into_iter()
            .map(|record| self.merge_confirmed(record))
            .filter(MergeOutcome::changed)
            .count()
    }

    /// Apply an edited record: body and edited flag change, position does not.
    pub fn apply_edit(&mut self, record: &Message) -> ChatResult<usize> {
        let id = record
            .id()
            .ok_or_else(|| ChatError::validation("edited record has no permanent id"))?;
        let index = self
            .position_of_id(id)
            .ok_or_else(|| ChatError::not_found("message", id))?;

        let entry = &mut self.messages[index];
        entry.body = record.body.clone();
        entry.edited = true;
        Ok(index)
    }

    /// Remove the entry with the given permanent id.
    pub fn remove(&mut self, message_id: &str) -> ChatResult<Message> {
        let index = self
            .position_of_id(message_id)
            .ok_or_else(|| ChatError::not_found("message", message_id))?;
        Ok(self.messages.remove(index))
    }

    /// Advance the delivery state of a confirmed entry; returns whether it changed.
    pub fn advance_delivery(&mut self, message_id: &str, state: DeliveryState) -> ChatResult<bool> {
        let index = self
            .position_of_id(message_id)
            .ok_or_else(|| ChatError::not_found("message", message_id))?;
        Ok(self.messages[index].advance(state))
    }

    /// Flag a pending entry as failed. Nothing does this automatically.
    pub fn mark_failed(&mut self, temp_id: &str) -> ChatResult<()> {
        let index = self
            .position_of_pending(temp_id)
            .ok_or_else(|| ChatError::not_found("pending message", temp_id))?;
        self.messages[index].delivery = DeliveryState::Failed;
        Ok(())
    }
}
