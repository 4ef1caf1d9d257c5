//! Permission checking utilities.

use crate::entities::{Actor, Conversation, Message, Room};
use crate::types::ChatError;

/// Permission checking utilities
pub struct PermissionChecker;

impl PermissionChecker {
    /// Check if an actor can join, read, or post in a conversation.
    ///
    /// Conversations of another tenant read as not found.
    pub fn can_access(actor: &Actor, conversation: &Conversation) -> Result<(), ChatError> {
        if conversation.tenant_id() != actor.tenant_id {
            return Err(ChatError::not_found("conversation", conversation.key().to_string()));
        }
        if !conversation.has_participant(&actor.user_id) {
            return Err(ChatError::unauthorized(
                "User is not a participant of this conversation",
            ));
        }
        Ok(())
    }

    /// Only the sender may edit a message
    pub fn can_edit_message(actor: &Actor, message: &Message) -> Result<(), ChatError> {
        if message.sender_id != actor.user_id {
            return Err(ChatError::unauthorized("Only the sender can edit a message"));
        }
        Ok(())
    }

    /// The sender may delete a message, and so may the creator of its room
    pub fn can_delete_message(
        actor: &Actor,
        message: &Message,
        conversation: &Conversation,
    ) -> Result<(), ChatError> {
        if message.sender_id == actor.user_id {
            return Ok(());
        }
        if conversation.creator_id() == Some(actor.user_id.as_str()) {
            return Ok(());
        }
        Err(ChatError::unauthorized(
            "Only the sender or the room creator can delete a message",
        ))
    }

    /// Only the creator may delete a room
    pub fn can_delete_room(actor: &Actor, room: &Room) -> Result<(), ChatError> {
        if room.tenant_id != actor.tenant_id {
            return Err(ChatError::not_found("room", &room.id));
        }
        if !room.is_creator(&actor.user_id) {
            return Err(ChatError::unauthorized("Only the room creator can delete a room"));
        }
        Ok(())
    }
}
