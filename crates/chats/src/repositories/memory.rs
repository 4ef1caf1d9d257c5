//! In-memory storage, used by tests and by the gateway when no database is wanted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ChatRepository, HistoryQuery};
use crate::entities::{
    Actor, Conversation, ConversationKey, ConversationKind, DeliveryState, Message, NewMessage,
    Room, TaskConversation,
};
use crate::types::{ChatError, ChatResult};
use crate::utils::PermissionChecker;

#[derive(Debug)]
struct StoredMessage {
    tenant_id: String,
    /// Insertion order, breaks timestamp ties
    seq: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: HashMap<(String, String), TaskConversation>,
    rooms: HashMap<(String, String), Room>,
    messages: HashMap<String, StoredMessage>,
    next_seq: u64,
}

/// Storage backed by hash maps behind one async lock
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages across all tenants.
    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }
}

fn lookup_key(tenant_id: &str, id: &str) -> (String, String) {
    (tenant_id.to_string(), id.to_string())
}

impl MemoryState {
    fn conversation(&self, tenant_id: &str, key: &ConversationKey) -> ChatResult<Conversation> {
        let lookup = lookup_key(tenant_id, &key.id);
        match key.kind {
            ConversationKind::Task => self
                .tasks
                .get(&lookup)
                .cloned()
                .map(Conversation::Task)
                .ok_or_else(|| ChatError::not_found("task", &key.id)),
            ConversationKind::Room => self
                .rooms
                .get(&lookup)
                .cloned()
                .map(Conversation::Room)
                .ok_or_else(|| ChatError::not_found("room", &key.id)),
        }
    }

    fn message_mut(&mut self, tenant_id: &str, message_id: &str) -> ChatResult<&mut Message> {
        match self.messages.get_mut(message_id) {
            Some(stored) if stored.tenant_id == tenant_id => Ok(&mut stored.message),
            _ => Err(ChatError::not_found("message", message_id)),
        }
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn authorize(&self, actor: &Actor, key: &ConversationKey) -> ChatResult<Conversation> {
        let state = self.state.read().await;
        let conversation = state.conversation(&actor.tenant_id, key)?;
        PermissionChecker::can_access(actor, &conversation)?;
        Ok(conversation)
    }

    async fn create_message(&self, message: NewMessage) -> ChatResult<Message> {
        let mut state = self.state.write().await;
        state.conversation(&message.tenant_id, &message.conversation)?;

        let tenant_id = message.tenant_id.clone();
        let record = Message::confirmed(message, cuid2::create_id(), Utc::now());
        let id = record.id.clone().unwrap_or_default();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.messages.insert(
            id.clone(),
            StoredMessage {
                tenant_id,
                seq,
                message: record.clone(),
            },
        );

        debug!(message_id = %id, conversation = %record.conversation, "stored message");
        Ok(record)
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        key: &ConversationKey,
        query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>> {
        let state = self.state.read().await;
        state.conversation(tenant_id, key)?;

        let in_conversation =
            |stored: &StoredMessage| stored.tenant_id == tenant_id && &stored.message.conversation == key;
        let cursor = query
            .before_id
            .as_deref()
            .and_then(|id| state.messages.get(id))
            .filter(|stored| in_conversation(*stored))
            .map(|stored| (stored.message.created_at, stored.seq));

        let mut stored: Vec<&StoredMessage> = state
            .messages
            .values()
            .filter(|stored| in_conversation(*stored))
            .filter(|stored| match cursor {
                Some(cursor) => (stored.message.created_at, stored.seq) < cursor,
                None => query
                    .before
                    .map_or(true, |before| stored.message.created_at < before),
            })
            .collect();
        stored.sort_by_key(|stored| (stored.message.created_at, stored.seq));

        let limit = query.effective_limit() as usize;
        let skip = stored.len().saturating_sub(limit);
        Ok(stored
            .into_iter()
            .skip(skip)
            .map(|stored| stored.message.clone())
            .collect())
    }

    async fn get_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<Message> {
        let state = self.state.read().await;
        match state.messages.get(message_id) {
            Some(stored) if stored.tenant_id == tenant_id => Ok(stored.message.clone()),
            _ => Err(ChatError::not_found("message", message_id)),
        }
    }

    async fn update_message_body(
        &self,
        tenant_id: &str,
        message_id: &str,
        body: &str,
    ) -> ChatResult<Message> {
        let mut state = self.state.write().await;
        let message = state.message_mut(tenant_id, message_id)?;
        message.body = body.to_string();
        message.edited = true;
        Ok(message.clone())
    }

    async fn delete_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<()> {
        let mut state = self.state.write().await;
        state.message_mut(tenant_id, message_id)?;
        state.messages.remove(message_id);
        Ok(())
    }

    async fn advance_delivery(
        &self,
        tenant_id: &str,
        message_id: &str,
        delivery: DeliveryState,
    ) -> ChatResult<Message> {
        let mut state = self.state.write().await;
        let message = state.message_mut(tenant_id, message_id)?;
        message.advance(delivery);
        Ok(message.clone())
    }

    async fn create_room(&self, room: Room) -> ChatResult<Room> {
        let mut state = self.state.write().await;
        let key = lookup_key(&room.tenant_id, &room.id);
        if state.rooms.contains_key(&key) {
            return Err(ChatError::validation(format!("room {} already exists", room.id)));
        }
        state.rooms.insert(key, room.clone());
        Ok(room)
    }

    async fn list_rooms(&self, tenant_id: &str, user_id: &str) -> ChatResult<Vec<Room>> {
        let state = self.state.read().await;
        let mut rooms: Vec<Room> = state
            .rooms
            .values()
            .filter(|room| room.tenant_id == tenant_id && room.is_member(user_id))
            .cloned()
            .collect();
        rooms.sort_by_key(|room| room.created_at);
        Ok(rooms)
    }

    async fn get_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<Room> {
        let state = self.state.read().await;
        state
            .rooms
            .get(&lookup_key(tenant_id, room_id))
            .cloned()
            .ok_or_else(|| ChatError::not_found("room", room_id))
    }

    async fn delete_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<()> {
        let mut state = self.state.write().await;
        if state.rooms.remove(&lookup_key(tenant_id, room_id)).is_none() {
            return Err(ChatError::not_found("room", room_id));
        }

        let key = ConversationKey::room(room_id);
        state
            .messages
            .retain(|_, stored| !(stored.tenant_id == tenant_id && stored.message.conversation == key));
        Ok(())
    }

    async fn upsert_task(&self, task: TaskConversation) -> ChatResult<TaskConversation> {
        let mut state = self.state.write().await;
        state
            .tasks
            .insert(lookup_key(&task.tenant_id, &task.task_id), task.clone());
        Ok(task)
    }
}
