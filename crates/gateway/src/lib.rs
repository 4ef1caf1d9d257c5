//! # Huddle Gateway Crate
//!
//! Server side of the Huddle chat core. It accepts websocket connections,
//! fans conversation events out to channel members, and serves the REST
//! endpoints clients use for history, edits, deletes, and room management.
//!
//! ## Architecture
//!
//! - **Hub**: One broadcast channel per conversation and a forwarder per membership
//! - **Dispatch**: Handling of inbound websocket frames and their acks
//! - **Rooms**: Room lifecycle with background deletion
//! - **REST**: HTTP endpoints backed by the storage collaborator
//! - **WebSocket**: Connection loop
//! - **Middleware**: Identity extraction, CORS, and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use huddle_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::from_config(&config.database, config.channels).await?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod hub;
pub mod middleware;
pub mod rest;
pub mod rooms;
pub mod state;
pub mod websocket;

// Re-export main types for convenience
pub use dispatch::{dispatch_frame, Connection};
pub use error::{GatewayError, GatewayResult};
pub use hub::{ChannelHub, Routed};
pub use middleware::Identity;
pub use rooms::RoomLifecycle;
pub use state::GatewayState;

use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);
    Router::new()
        // REST API routes
        .merge(rest::create_rest_routes().with_state(arc_state.clone()))
        // WebSocket routes
        .merge(websocket::create_websocket_routes().with_state(arc_state))
        .layer(middleware::create_cors_middleware())
        .layer(middleware::create_trace_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
