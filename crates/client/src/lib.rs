//! # Huddle Client Crate
//!
//! Network plumbing for the conversation client in `huddle-chats`: a
//! websocket [`Transport`](huddle_chats::Transport) built on
//! tokio-tungstenite and a [`ConversationApi`](huddle_chats::ConversationApi)
//! that talks to the gateway's REST endpoints with reqwest.

pub mod http;
pub mod ws;

use std::time::Duration;

use huddle_chats::{Actor, ChatClient, ChatResult};
use tokio::task::JoinHandle;

pub use http::HttpConversationApi;
pub use ws::{connect, websocket_url, WsTransport};

/// Chat client wired to a live gateway
pub type HuddleClient = ChatClient<WsTransport, HttpConversationApi>;

/// Connect to the gateway at `base_url` and start dispatching its events.
///
/// The returned handle finishes once the connection is gone and the client
/// has processed the disconnect.
pub async fn connect_client(
    base_url: &str,
    actor: Actor,
    typing_cooldown: Duration,
    typing_timeout: Duration,
) -> ChatResult<(HuddleClient, JoinHandle<()>)> {
    let api = HttpConversationApi::new(base_url, actor.clone())?;
    let (transport, events) = connect(base_url, &actor).await?;
    let client = ChatClient::new(actor, transport, api, typing_cooldown, typing_timeout);
    let dispatch = tokio::spawn(client.clone().run(events));
    Ok((client, dispatch))
}
