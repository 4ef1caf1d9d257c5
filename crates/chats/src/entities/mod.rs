//! Domain entities for the chat system.
//!
//! Pure domain objects shared by the client store and the gateway; the wire
//! layer serializes them directly.

pub mod actor;
pub mod conversation;
pub mod message;
pub mod room;

pub use actor::Actor;
pub use conversation::{Conversation, ConversationKey, ConversationKind, TaskConversation};
pub use message::{AttachmentRef, DeliveryState, Message, NewMessage, UpdateMessageRequest};
pub use room::{CreateRoomRequest, Room};
