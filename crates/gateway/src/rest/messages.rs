//! Message REST endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use huddle_chats::{
    utils::{PermissionChecker, Validator},
    ConversationKey, ConversationKind, HistoryQuery, Message, ServerEvent, UpdateMessageRequest,
};
use std::sync::Arc;
use tracing::info;

use crate::error::GatewayResult;
use crate::middleware::Identity;
use crate::state::GatewayState;

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/conversations/:kind/:id/messages", get(list_messages))
        .route(
            "/api/messages/:message_id",
            patch(update_message).delete(delete_message),
        )
}

/// Newest page of a conversation's history, oldest first.
pub async fn list_messages(
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> GatewayResult<Json<Vec<Message>>> {
    let kind: ConversationKind = kind.parse()?;
    let key = ConversationKey::new(kind, id);

    state.repository().authorize(&actor, &key).await?;
    let messages = state
        .repository()
        .list_messages(&actor.tenant_id, &key, &query)
        .await?;

    Ok(Json(messages))
}

/// Edit a message body. Only the sender may edit.
pub async fn update_message(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
    Json(payload): Json<UpdateMessageRequest>,
) -> GatewayResult<Json<Message>> {
    let repository = state.repository();
    let message = repository.get_message(&actor.tenant_id, &message_id).await?;
    repository.authorize(&actor, &message.conversation).await?;
    PermissionChecker::can_edit_message(&actor, &message)?;
    Validator::message_body(&payload.body)?;

    let updated = repository
        .update_message_body(&actor.tenant_id, &message_id, &payload.body)
        .await?;
    info!(message_id = %message_id, user_id = %actor.user_id, "message edited");

    if updated.conversation.is_room() {
        state
            .hub()
            .broadcast(
                &updated.conversation,
                None,
                ServerEvent::RoomMessageEdited {
                    message: updated.clone(),
                },
            )
            .await;
    }

    Ok(Json(updated))
}

/// Delete a message. The sender, or the room creator for room messages.
pub async fn delete_message(
    Path(message_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> GatewayResult<StatusCode> {
    let repository = state.repository();
    let message = repository.get_message(&actor.tenant_id, &message_id).await?;
    let conversation = repository.authorize(&actor, &message.conversation).await?;
    PermissionChecker::can_delete_message(&actor, &message, &conversation)?;

    repository
        .delete_message(&actor.tenant_id, &message_id)
        .await?;
    info!(message_id = %message_id, user_id = %actor.user_id, "message deleted");

    if let ConversationKey {
        kind: ConversationKind::Room,
        id: room_id,
    } = &message.conversation
    {
        state
            .hub()
            .broadcast(
                &message.conversation,
                None,
                ServerEvent::RoomMessageDeleted {
                    room_id: room_id.clone(),
                    message_id,
                },
            )
            .await;
    }

    Ok(StatusCode::NO_CONTENT)
}
