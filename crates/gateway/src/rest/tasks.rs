//! Task conversation registration.
//!
//! Tasks are owned elsewhere; their owner registers who takes part in the
//! task's conversation here.

use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use huddle_chats::{utils::Validator, TaskConversation};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::middleware::Identity;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTaskRequest {
    pub assignee_id: String,
    pub assigner_id: String,
}

/// Create task routes
pub fn create_task_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/tasks/:task_id", put(register_task))
}

pub async fn register_task(
    Path(task_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Identity(actor): Identity,
    Json(payload): Json<RegisterTaskRequest>,
) -> GatewayResult<Json<TaskConversation>> {
    Validator::identifier("Task id", &task_id)?;
    Validator::identifier("Assignee id", &payload.assignee_id)?;
    Validator::identifier("Assigner id", &payload.assigner_id)?;

    let task = state
        .repository()
        .upsert_task(TaskConversation {
            tenant_id: actor.tenant_id,
            task_id,
            assignee_id: payload.assignee_id,
            assigner_id: payload.assigner_id,
        })
        .await?;

    Ok(Json(task))
}
