//! Storage contract for conversations, messages, and rooms.
//!
//! The gateway persists through [`ChatRepository`]; every lookup is scoped to
//! the caller's tenant and anything outside it reads as not found.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{
    Actor, Conversation, ConversationKey, DeliveryState, Message, NewMessage, Room,
    TaskConversation,
};
use crate::types::ChatResult;

pub use memory::InMemoryChatRepository;

/// Default page size for history requests
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
/// Largest page a history request may ask for
pub const MAX_HISTORY_LIMIT: u32 = 200;

/// Page selector for message history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Page size, clamped to [`MAX_HISTORY_LIMIT`]
    #[serde(default)]
    pub limit: Option<u32>,
    /// Only messages created strictly before this instant
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    /// Only messages older than this one, ties on `created_at` broken by
    /// insertion order. Takes precedence over `before` when the id resolves.
    #[serde(default, rename = "beforeId")]
    pub before_id: Option<String>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Resolve a conversation for the actor; fails unless the actor's tenant
    /// owns it and the actor participates in it.
    async fn authorize(&self, actor: &Actor, key: &ConversationKey) -> ChatResult<Conversation>;

    /// Persist a message, assigning its permanent id and timestamp.
    async fn create_message(&self, message: NewMessage) -> ChatResult<Message>;

    /// Newest page of a conversation's history, returned oldest first.
    async fn list_messages(
        &self,
        tenant_id: &str,
        key: &ConversationKey,
        query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>>;

    async fn get_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<Message>;

    /// Replace a message body and flag it edited.
    async fn update_message_body(
        &self,
        tenant_id: &str,
        message_id: &str,
        body: &str,
    ) -> ChatResult<Message>;

    async fn delete_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<()>;

    /// Move the delivery state forward; never regresses it.
    async fn advance_delivery(
        &self,
        tenant_id: &str,
        message_id: &str,
        state: DeliveryState,
    ) -> ChatResult<Message>;

    async fn create_room(&self, room: Room) -> ChatResult<Room>;

    /// Rooms of the tenant the user is a member of.
    async fn list_rooms(&self, tenant_id: &str, user_id: &str) -> ChatResult<Vec<Room>>;

    async fn get_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<Room>;

    /// Delete a room together with its message history.
    async fn delete_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<()>;

    /// Register or update the participants of a task conversation.
    async fn upsert_task(&self, task: TaskConversation) -> ChatResult<TaskConversation>;
}
