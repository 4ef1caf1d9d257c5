//! Handling of inbound websocket frames.
//!
//! Each frame produces at most one direct reply for the sending connection.
//! Frames that carried an `ack` number are always answered with an `ack`;
//! the others get the plain event (or an `error`) when there is something
//! to say.

use huddle_chats::{
    types::ConnectionId, utils::Validator, AckOutcome, Actor, ChatError, ChatResult, ClientEvent,
    ClientFrame, ConversationKey, ConversationKind, DeliveryState, Message, NewMessage,
    ServerEvent,
};
use tracing::{debug, warn};

use crate::state::GatewayState;

/// Identity of one live websocket connection
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub actor: Actor,
}

/// What a handled event yields for the sender
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Joined(ConversationKey),
    Left(ConversationKey),
    /// Persisted message, returned to the sender
    Message(Message),
    /// Queued for background processing
    Accepted,
    Pong,
    /// Nothing to report back
    Done,
}

impl Reply {
    fn into_outcome(self) -> AckOutcome {
        match self {
            Reply::Message(message) => AckOutcome::with_message(message),
            Reply::Accepted => AckOutcome::Accepted,
            _ => AckOutcome::ok(),
        }
    }

    fn into_event(self) -> Option<ServerEvent> {
        match self {
            Reply::Joined(key) => Some(ServerEvent::Joined {
                kind: key.kind,
                id: key.id,
            }),
            Reply::Left(key) => Some(ServerEvent::Left {
                kind: key.kind,
                id: key.id,
            }),
            Reply::Message(message) => Some(received(message)),
            Reply::Pong => Some(ServerEvent::Pong),
            Reply::Accepted | Reply::Done => None,
        }
    }
}

fn received(message: Message) -> ServerEvent {
    match message.conversation.kind {
        ConversationKind::Task => ServerEvent::MessageReceived { message },
        ConversationKind::Room => ServerEvent::RoomMessageReceived { message },
    }
}

/// Handle one frame and build the direct reply, if any.
pub async fn dispatch_frame(
    state: &GatewayState,
    connection: &Connection,
    frame: ClientFrame,
) -> Option<ServerEvent> {
    let event_name = frame.event.event_type_name();
    debug!(
        connection_id = %connection.id,
        event = event_name,
        ack = ?frame.ack,
        "client frame"
    );

    let result = dispatch_event(state, connection, frame.event).await;
    if let Err(err) = &result {
        warn!(
            connection_id = %connection.id,
            user_id = %connection.actor.user_id,
            event = event_name,
            error = %err,
            "client event rejected"
        );
    }

    match (frame.ack, result) {
        (Some(ack), Ok(reply)) => Some(ServerEvent::Ack {
            ack,
            outcome: reply.into_outcome(),
        }),
        (Some(ack), Err(err)) => Some(ServerEvent::Ack {
            ack,
            outcome: AckOutcome::from_error(&err),
        }),
        (None, Ok(reply)) => reply.into_event(),
        (None, Err(err)) => Some(ServerEvent::error(&err)),
    }
}

async fn dispatch_event(
    state: &GatewayState,
    connection: &Connection,
    event: ClientEvent,
) -> ChatResult<Reply> {
    match event {
        ClientEvent::Join { kind, id } => join(state, connection, ConversationKey::new(kind, id)).await,
        ClientEvent::Leave { kind, id } => {
            let key = ConversationKey::new(kind, id);
            state.hub().unsubscribe(&connection.id, &key).await;
            Ok(Reply::Left(key))
        }
        ClientEvent::SendMessage {
            conversation_id,
            body,
            temp_id,
        } => send(state, connection, ConversationKey::task(conversation_id), body, temp_id).await,
        ClientEvent::SendRoomMessage {
            room_id,
            body,
            temp_id,
        } => send(state, connection, ConversationKey::room(room_id), body, temp_id).await,
        ClientEvent::Typing {
            conversation_id, ..
        } => {
            let key = ConversationKey::task(conversation_id.clone());
            require_member(state, connection, &key).await?;
            state
                .hub()
                .broadcast(
                    &key,
                    Some(&connection.id),
                    ServerEvent::Typing {
                        conversation_id,
                        user_id: connection.actor.user_id.clone(),
                    },
                )
                .await;
            Ok(Reply::Done)
        }
        ClientEvent::RoomTyping { room_id, .. } => {
            let key = ConversationKey::room(room_id.clone());
            require_member(state, connection, &key).await?;
            state
                .hub()
                .broadcast(
                    &key,
                    Some(&connection.id),
                    ServerEvent::RoomTyping {
                        room_id,
                        user_id: connection.actor.user_id.clone(),
                        user_name: connection.actor.display_name.clone(),
                    },
                )
                .await;
            Ok(Reply::Done)
        }
        ClientEvent::DeleteRoomEntity { room_id } => {
            state.rooms().request_delete(&connection.actor, &room_id).await?;
            Ok(Reply::Accepted)
        }
        ClientEvent::RoomMessageDelivered {
            room_id,
            message_id,
        } => receipt(state, connection, room_id, message_id, DeliveryState::Delivered).await,
        ClientEvent::RoomMessageRead {
            room_id,
            message_id,
        } => receipt(state, connection, room_id, message_id, DeliveryState::Read).await,
        ClientEvent::Ping => Ok(Reply::Pong),
    }
}

async fn join(
    state: &GatewayState,
    connection: &Connection,
    key: ConversationKey,
) -> ChatResult<Reply> {
    Validator::identifier("Conversation id", &key.id)?;
    state.repository().authorize(&connection.actor, &key).await?;
    state.hub().subscribe(&connection.id, &key).await;
    Ok(Reply::Joined(key))
}

async fn require_member(
    state: &GatewayState,
    connection: &Connection,
    key: &ConversationKey,
) -> ChatResult<()> {
    if state.hub().is_member(&connection.id, key).await {
        Ok(())
    } else {
        Err(ChatError::unauthorized(format!("Join {} first", key)))
    }
}

async fn send(
    state: &GatewayState,
    connection: &Connection,
    key: ConversationKey,
    body: String,
    temp_id: String,
) -> ChatResult<Reply> {
    let actor = &connection.actor;
    state.repository().authorize(actor, &key).await?;
    Validator::message_body(&body)?;
    Validator::identifier("Temp id", &temp_id)?;

    let message = state
        .repository()
        .create_message(NewMessage {
            tenant_id: actor.tenant_id.clone(),
            conversation: key.clone(),
            sender_id: actor.user_id.clone(),
            sender_name: actor.display_name.clone(),
            body,
            temp_id: Some(temp_id),
            attachment: None,
        })
        .await?;

    let notified = state
        .hub()
        .broadcast(&key, Some(&connection.id), received(message.clone()))
        .await;
    debug!(
        conversation = %key,
        message_id = ?message.id,
        notified,
        "message broadcast"
    );
    Ok(Reply::Message(message))
}

async fn receipt(
    state: &GatewayState,
    connection: &Connection,
    room_id: String,
    message_id: String,
    delivery: DeliveryState,
) -> ChatResult<Reply> {
    let key = ConversationKey::room(room_id.clone());
    let tenant_id = &connection.actor.tenant_id;
    state.repository().authorize(&connection.actor, &key).await?;

    let message = state.repository().get_message(tenant_id, &message_id).await?;
    if message.conversation != key {
        return Err(ChatError::not_found("message", &message_id));
    }
    state
        .repository()
        .advance_delivery(tenant_id, &message_id, delivery)
        .await?;

    let event = match delivery {
        DeliveryState::Read => ServerEvent::RoomMessageRead {
            room_id,
            message_id,
        },
        _ => ServerEvent::RoomMessageDelivered {
            room_id,
            message_id,
        },
    };
    state.hub().broadcast(&key, Some(&connection.id), event).await;
    Ok(Reply::Done)
}
