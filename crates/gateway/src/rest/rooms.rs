//! Room REST endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use huddle_chats::{CreateRoomRequest, Room};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::middleware::Identity;
use crate::state::GatewayState;

/// Create room routes
pub fn create_room_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/rooms/:room_id", get(get_room).delete(delete_room))
}

pub async fn list_rooms(
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> GatewayResult<Json<Vec<Room>>> {
    let rooms = state.rooms().list(&actor).await?;
    Ok(Json(rooms))
}

pub async fn create_room(
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
    Json(payload): Json<CreateRoomRequest>,
) -> GatewayResult<impl IntoResponse> {
    let room = state.rooms().create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_room(
    Path(room_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> GatewayResult<Json<Room>> {
    let room = state.rooms().get(&actor, &room_id).await?;
    Ok(Json(room))
}

/// Schedule room deletion; members are told through `roomDeleted`.
pub async fn delete_room(
    Path(room_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
) -> GatewayResult<StatusCode> {
    state.rooms().request_delete(&actor, &room_id).await?;
    Ok(StatusCode::ACCEPTED)
}
