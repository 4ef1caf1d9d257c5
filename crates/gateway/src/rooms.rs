//! Room creation, lookup, and background deletion.

use std::collections::HashSet;
use std::sync::Arc;

use huddle_chats::{
    utils::{PermissionChecker, Validator},
    Actor, ChatError, ChatRepository, ChatResult, ConversationKey, CreateRoomRequest, Room,
    ServerEvent,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::hub::ChannelHub;

/// Server side room lifecycle.
///
/// Deleting a room is accepted immediately and carried out on a spawned
/// task; members learn about it through `roomDeleted` on the room channel.
#[derive(Clone)]
pub struct RoomLifecycle {
    repository: Arc<dyn ChatRepository>,
    hub: Arc<ChannelHub>,
    pending_deletes: Arc<Mutex<HashSet<(String, String)>>>,
}

impl RoomLifecycle {
    pub fn new(repository: Arc<dyn ChatRepository>, hub: Arc<ChannelHub>) -> Self {
        Self {
            repository,
            hub,
            pending_deletes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a room owned by the actor. Creating a room does not join its
    /// channel.
    pub async fn create(&self, actor: &Actor, request: CreateRoomRequest) -> ChatResult<Room> {
        Validator::create_room(&request)?;
        let room = Room::new(
            actor.tenant_id.clone(),
            actor.user_id.clone(),
            request.name.trim(),
            request.member_ids,
        );
        self.repository.create_room(room).await
    }

    /// Rooms the actor is a member of.
    pub async fn list(&self, actor: &Actor) -> ChatResult<Vec<Room>> {
        self.repository
            .list_rooms(&actor.tenant_id, &actor.user_id)
            .await
    }

    pub async fn get(&self, actor: &Actor, room_id: &str) -> ChatResult<Room> {
        let room = self.repository.get_room(&actor.tenant_id, room_id).await?;
        if !room.is_member(&actor.user_id) {
            return Err(ChatError::unauthorized("Not a member of this room"));
        }
        Ok(room)
    }

    /// Schedule deletion of a room and its history. Only the creator may ask.
    ///
    /// Returns the handle of the deletion task, or `None` when a deletion of
    /// the same room is already in flight.
    pub async fn request_delete(
        &self,
        actor: &Actor,
        room_id: &str,
    ) -> ChatResult<Option<JoinHandle<()>>> {
        let room = self.repository.get_room(&actor.tenant_id, room_id).await?;
        PermissionChecker::can_delete_room(actor, &room)?;

        let ticket = (room.tenant_id.clone(), room.id.clone());
        if !self.pending_deletes.lock().await.insert(ticket.clone()) {
            info!(room_id, "room deletion already pending");
            return Ok(None);
        }

        info!(room_id, requested_by = %actor.user_id, "room deletion accepted");
        let lifecycle = self.clone();
        Ok(Some(tokio::spawn(async move {
            lifecycle.delete_now(ticket).await;
        })))
    }

    pub async fn is_delete_pending(&self, tenant_id: &str, room_id: &str) -> bool {
        self.pending_deletes
            .lock()
            .await
            .contains(&(tenant_id.to_string(), room_id.to_string()))
    }

    async fn delete_now(&self, ticket: (String, String)) {
        let (tenant_id, room_id) = &ticket;
        match self.repository.delete_room(tenant_id, room_id).await {
            Ok(()) => {
                let key = ConversationKey::room(room_id.clone());
                let notified = self
                    .hub
                    .broadcast(
                        &key,
                        None,
                        ServerEvent::RoomDeleted {
                            room_id: room_id.clone(),
                        },
                    )
                    .await;
                self.hub.evict(&key).await;
                info!(room_id = %room_id, notified, "room deleted");
            }
            Err(err) => {
                error!(room_id = %room_id, error = %err, "room deletion failed");
            }
        }
        self.pending_deletes.lock().await.remove(&ticket);
    }
}
