//! Shared types for the chat system.
//!
//! Error definitions and the websocket wire events used by both the client
//! and the gateway.

pub mod errors;
pub mod events;

pub use errors::{ChatError, ChatResult, ErrorCode};
pub use events::*;

// Common type aliases
pub type MessageId = String;
pub type TempId = String;
pub type RoomId = String;
pub type TaskId = String;
pub type UserId = String;
pub type TenantId = String;
pub type ConnectionId = String;
