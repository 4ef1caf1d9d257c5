use async_trait::async_trait;

use crate::entities::{ConversationKey, CreateRoomRequest, Message, Room};
use crate::repositories::HistoryQuery;
use crate::types::ChatResult;

/// Request/response collaborator used next to the live channel for history,
/// edits, deletes, and room management.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    async fn fetch_history(
        &self,
        key: &ConversationKey,
        query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>>;

    async fn edit_message(&self, message_id: &str, body: &str) -> ChatResult<Message>;

    async fn delete_message(&self, message_id: &str) -> ChatResult<()>;

    async fn create_room(&self, request: &CreateRoomRequest) -> ChatResult<Room>;

    async fn list_rooms(&self) -> ChatResult<Vec<Room>>;

    async fn get_room(&self, room_id: &str) -> ChatResult<Room>;
}
