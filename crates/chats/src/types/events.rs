//! Websocket wire events exchanged between clients and the gateway.
//!
//! Frames are JSON objects discriminated by an `event` field with camelCase
//! names, e.g. `{"event":"sendRoomMessage","ack":3,"roomId":"r1",...}`.

use serde::{Deserialize, Serialize};

use super::errors::{ChatError, ChatResult, ErrorCode};
use crate::entities::{ConversationKey, ConversationKind, Message};

/// Frame sent by a client. `ack` requests an acknowledgement carrying the
/// same number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    #[serde(flatten)]
    pub event: ClientEvent,
}

impl ClientFrame {
    pub fn new(event: ClientEvent) -> Self {
        Self { ack: None, event }
    }

    pub fn with_ack(ack: u64, event: ClientEvent) -> Self {
        Self {
            ack: Some(ack),
            event,
        }
    }
}

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Join a conversation channel
    Join { kind: ConversationKind, id: String },

    /// Leave a conversation channel
    Leave { kind: ConversationKind, id: String },

    /// Send a message to a task conversation
    SendMessage {
        conversation_id: String,
        body: String,
        temp_id: String,
    },

    /// Send a message to a room
    SendRoomMessage {
        room_id: String,
        body: String,
        temp_id: String,
    },

    /// Typing in a task conversation
    Typing {
        conversation_id: String,
        user_id: String,
    },

    /// Typing in a room
    RoomTyping {
        room_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },

    /// Ask the gateway to delete a room
    DeleteRoomEntity { room_id: String },

    /// A room message reached the client
    RoomMessageDelivered { room_id: String, message_id: String },

    /// A room message was read
    RoomMessageRead { room_id: String, message_id: String },

    Ping,
}

impl ClientEvent {
    /// Conversation targeted by this event, when it targets one.
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match self {
            ClientEvent::Join { kind, id } | ClientEvent::Leave { kind, id } => {
                Some(ConversationKey::new(*kind, id.clone()))
            }
            ClientEvent::SendMessage {
                conversation_id, ..
            }
            | ClientEvent::Typing {
                conversation_id, ..
            } => Some(ConversationKey::task(conversation_id.clone())),
            ClientEvent::SendRoomMessage { room_id, .. }
            | ClientEvent::RoomTyping { room_id, .. }
            | ClientEvent::DeleteRoomEntity { room_id }
            | ClientEvent::RoomMessageDelivered { room_id, .. }
            | ClientEvent::RoomMessageRead { room_id, .. } => {
                Some(ConversationKey::room(room_id.clone()))
            }
            ClientEvent::Ping => None,
        }
    }

    /// Get the event name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ClientEvent::Join { .. } => "join",
            ClientEvent::Leave { .. } => "leave",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::SendRoomMessage { .. } => "sendRoomMessage",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::RoomTyping { .. } => "roomTyping",
            ClientEvent::DeleteRoomEntity { .. } => "deleteRoomEntity",
            ClientEvent::RoomMessageDelivered { .. } => "roomMessageDelivered",
            ClientEvent::RoomMessageRead { .. } => "roomMessageRead",
            ClientEvent::Ping => "ping",
        }
    }
}

/// Events the gateway sends to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent once after the websocket is accepted
    Connected { connection_id: String },

    /// Channel membership granted
    Joined { kind: ConversationKind, id: String },

    /// Channel membership dropped
    Left { kind: ConversationKind, id: String },

    /// Confirmed task conversation message
    MessageReceived { message: Message },

    /// Confirmed room message
    RoomMessageReceived { message: Message },

    Typing {
        conversation_id: String,
        user_id: String,
    },

    RoomTyping {
        room_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },

    RoomMessageDelivered { room_id: String, message_id: String },

    RoomMessageRead { room_id: String, message_id: String },

    /// A room message body changed
    RoomMessageEdited { message: Message },

    /// A room message was removed
    RoomMessageDeleted { room_id: String, message_id: String },

    /// The room and its history are gone
    RoomDeleted { room_id: String },

    /// Answer to a client frame that carried an `ack` number
    Ack { ack: u64, outcome: AckOutcome },

    /// Failure for a frame without an `ack` number
    Error { code: ErrorCode, message: String },

    Pong,
}

impl ServerEvent {
    pub fn error(err: &ChatError) -> Self {
        ServerEvent::Error {
            code: err.code(),
            message: err.detail().to_string(),
        }
    }

    /// Conversation this event belongs to, when it belongs to one.
    pub fn conversation_key(&self) -> Option<ConversationKey> {
        match self {
            ServerEvent::Joined { kind, id } | ServerEvent::Left { kind, id } => {
                Some(ConversationKey::new(*kind, id.clone()))
            }
            ServerEvent::MessageReceived { message }
            | ServerEvent::RoomMessageReceived { message }
            | ServerEvent::RoomMessageEdited { message } => Some(message.conversation.clone()),
            ServerEvent::Typing {
                conversation_id, ..
            } => Some(ConversationKey::task(conversation_id.clone())),
            ServerEvent::RoomTyping { room_id, .. }
            | ServerEvent::RoomMessageDelivered { room_id, .. }
            | ServerEvent::RoomMessageRead { room_id, .. }
            | ServerEvent::RoomMessageDeleted { room_id, .. }
            | ServerEvent::RoomDeleted { room_id } => Some(ConversationKey::room(room_id.clone())),
            ServerEvent::Connected { .. }
            | ServerEvent::Ack { .. }
            | ServerEvent::Error { .. }
            | ServerEvent::Pong => None,
        }
    }

    /// Get the event name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Left { .. } => "left",
            ServerEvent::MessageReceived { .. } => "messageReceived",
            ServerEvent::RoomMessageReceived { .. } => "roomMessageReceived",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::RoomTyping { .. } => "roomTyping",
            ServerEvent::RoomMessageDelivered { .. } => "roomMessageDelivered",
            ServerEvent::RoomMessageRead { .. } => "roomMessageRead",
            ServerEvent::RoomMessageEdited { .. } => "roomMessageEdited",
            ServerEvent::RoomMessageDeleted { .. } => "roomMessageDeleted",
            ServerEvent::RoomDeleted { .. } => "roomDeleted",
            ServerEvent::Ack { .. } => "ack",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Pong => "pong",
        }
    }
}

/// Result of an acknowledged client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AckOutcome {
    /// Applied; sends carry the persisted record
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Message>,
    },
    /// Queued for background processing
    Accepted,
    Error { code: ErrorCode, message: String },
}

impl AckOutcome {
    pub fn ok() -> Self {
        AckOutcome::Ok { message: None }
    }

    pub fn with_message(message: Message) -> Self {
        AckOutcome::Ok {
            message: Some(message),
        }
    }

    pub fn from_error(err: &ChatError) -> Self {
        AckOutcome::Error {
            code: err.code(),
            message: err.detail().to_string(),
        }
    }

    /// Turn a rejected outcome back into the error it carried.
    pub fn into_result(self) -> ChatResult<Option<Message>> {
        match self {
            AckOutcome::Ok { message } => Ok(message),
            AckOutcome::Accepted => Ok(None),
            AckOutcome::Error { code, message } => Err(ChatError::from_wire(code, message)),
        }
    }
}
