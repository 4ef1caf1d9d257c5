//! Websocket connection handling

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use huddle_chats::{Actor, ChatError, ClientFrame, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::{dispatch_frame, Connection};
use crate::middleware::Identity;
use crate::state::GatewayState;

/// Upgrade handler for `/ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, actor))
}

/// Drive one websocket connection until either side closes it.
///
/// Inbound frames are handled one after another; replies and channel
/// broadcasts share one outbound queue drained by the writer task.
async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, actor: Actor) {
    let connection = Connection {
        id: Uuid::new_v4().to_string(),
        actor,
    };
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(state.channels().outbound_buffer.max(1));

    state
        .hub()
        .register(connection.id.clone(), connection.actor.clone(), out_tx.clone())
        .await;
    info!(
        connection_id = %connection.id,
        tenant_id = %connection.actor.tenant_id,
        user_id = %connection.actor.user_id,
        "websocket connected"
    );

    let writer_id = connection.id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(connection_id = %writer_id, error = %err, "failed to encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let connected = ServerEvent::Connected {
        connection_id: connection.id.clone(),
    };
    if out_tx.send(connected).await.is_ok() {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => dispatch_frame(&state, &connection, frame).await,
                Err(err) => {
                    debug!(connection_id = %connection.id, error = %err, "malformed frame");
                    Some(ServerEvent::error(&ChatError::from(err)))
                }
            };

            if let Some(reply) = reply {
                if out_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub().unregister(&connection.id).await;
    drop(out_tx);
    let _ = writer.await;
    info!(connection_id = %connection.id, "websocket disconnected");
}
