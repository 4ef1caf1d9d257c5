//! # Huddle Chats Crate
//!
//! Conversation logic shared by the Huddle client and the gateway server.
//! It contains the domain entities, the websocket wire events, the
//! conversation state store with its reconciliation rules, typing presence,
//! and the storage contract the gateway persists through.
//!
//! ## Architecture
//!
//! - **Entities**: Domain models (Message, Room, TaskConversation, etc.)
//! - **Store**: Per-conversation ordered message lists and the merge rules
//! - **Services**: Typing presence and the client room directory
//! - **Client**: Channel gateway, chat client dispatch, and conversation sessions
//! - **Repositories**: Storage contract and the in-memory implementation
//! - **Types**: Errors and wire events
//! - **Utils**: Permissions and validation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use huddle_chats::{ChatClient, ConversationKey};
//!
//! let client = ChatClient::new(
//!     actor,
//!     transport,
//!     api,
//!     Duration::from_secs(2),
//!     Duration::from_secs(3),
//! );
//! let session = client.session(ConversationKey::room("r1"));
//! session.open().await?;
//! session.send("hello").await?;
//! ```

pub mod client;
pub mod entities;
pub mod repositories;
pub mod services;
pub mod store;
pub mod types;
pub mod utils;

pub use client::{
    ChannelGateway, ChatClient, ClientNotification, ConversationApi, ConversationSession,
    PendingAck, Transport,
};
pub use entities::{
    Actor, AttachmentRef, Conversation, ConversationKey, ConversationKind, CreateRoomRequest,
    DeliveryState, Message, NewMessage, Room, TaskConversation, UpdateMessageRequest,
};
pub use repositories::{ChatRepository, HistoryQuery, InMemoryChatRepository};
pub use services::{PresenceEntry, RoomDirectory, TypingDebouncer, TypingTracker};
pub use store::{ConversationState, ConversationStore, MergeOutcome};
pub use types::{
    AckOutcome, ChatError, ChatResult, ClientEvent, ClientFrame, ErrorCode, ServerEvent,
};
