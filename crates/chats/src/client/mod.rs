//! Client side of the live channel protocol.
//!
//! [`ChannelGateway`] owns acks and channel membership over a [`Transport`];
//! [`ChatClient`] dispatches inbound frames into the conversation store;
//! [`ConversationSession`] is the open/send/close handle the UI drives.

pub mod api;
pub mod chat_client;
pub mod gateway;
pub mod session;

pub use api::ConversationApi;
pub use chat_client::{ChatClient, ClientNotification};
pub use gateway::{ChannelGateway, PendingAck, Transport};
pub use session::ConversationSession;
