//! REST API endpoints for the gateway

pub mod health;
pub mod messages;
pub mod rooms;
pub mod tasks;

use axum::{routing::get, Router};
use crate::state::GatewayState;
use std::sync::Arc;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Message history, edits, and deletes
        .merge(messages::create_message_routes())
        // Room lifecycle
        .merge(rooms::create_room_routes())
        // Task conversation registration
        .merge(tasks::create_task_routes())
}
