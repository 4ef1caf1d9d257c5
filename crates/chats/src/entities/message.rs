use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationKey;

/// Delivery progress of a message.
///
/// `Sending < Sent < Delivered < Read`; `Failed` sits outside that order and
/// is only ever set by an explicit caller decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryState {
    fn rank(&self) -> Option<u8> {
        match self {
            DeliveryState::Sending => Some(0),
            DeliveryState::Sent => Some(1),
            DeliveryState::Delivered => Some(2),
            DeliveryState::Read => Some(3),
            DeliveryState::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_advance_to(&self, next: DeliveryState) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Sending => "sending",
            DeliveryState::Sent => "sent",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Read => "read",
            DeliveryState::Failed => "failed",
        }
    }
}

impl From<&str> for DeliveryState {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sending" => DeliveryState::Sending,
            "delivered" => DeliveryState::Delivered,
            "read" => DeliveryState::Read,
            "failed" => DeliveryState::Failed,
            _ => DeliveryState::Sent,
        }
    }
}

/// Reference to an attachment held by external storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: String,
    pub name: String,
}

/// Represents a message within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Permanent identifier, assigned once the server persisted the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client correlation id carried from send to confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    /// Conversation the message belongs to
    pub conversation: ConversationKey,
    /// User who sent the message
    pub sender_id: String,
    /// Sender display name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message text
    pub body: String,
    /// Creation timestamp, local for pending messages and server-assigned once confirmed
    pub created_at: DateTime<Utc>,
    /// Delivery progress
    pub delivery: DeliveryState,
    /// Set once the body has been edited
    #[serde(default)]
    pub edited: bool,
    /// Optional attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
}

impl Message {
    /// Build the optimistic local entry for a message that is being sent.
    pub fn pending(
        conversation: ConversationKey,
        sender_id: impl Into<String>,
        sender_name: Option<String>,
        body: impl Into<String>,
        temp_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            temp_id: Some(temp_id.into()),
            conversation,
            sender_id: sender_id.into(),
            sender_name,
            body: body.into(),
            created_at,
            delivery: DeliveryState::Sending,
            edited: false,
            attachment: None,
        }
    }

    /// Build a persisted record from an accepted send.
    pub fn confirmed(new_message: NewMessage, id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id.into()),
            temp_id: new_message.temp_id,
            conversation: new_message.conversation,
            sender_id: new_message.sender_id,
            sender_name: new_message.sender_name,
            body: new_message.body,
            created_at,
            delivery: DeliveryState::Sent,
            edited: false,
            attachment: new_message.attachment,
        }
    }

    /// Pending entries have no permanent id yet.
    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn temp_id(&self) -> Option<&str> {
        self.temp_id.as_deref()
    }

    /// Advance the delivery state; returns whether it changed.
    pub fn advance(&mut self, next: DeliveryState) -> bool {
        if self.delivery.can_advance_to(next) {
            self.delivery = next;
            true
        } else {
            false
        }
    }
}

/// Message accepted for persistence, before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub tenant_id: String,
    pub conversation: ConversationKey,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub body: String,
    #[serde(default)]
    pub temp_id: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentRef>,
}

/// Request to update a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessageRequest {
    /// Updated body
    pub body: String,
}
