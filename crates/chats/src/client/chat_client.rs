use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::api::ConversationApi;
use super::gateway::{lock, ChannelGateway, Transport};
use super::session::ConversationSession;
use crate::entities::{Actor, ConversationKey, CreateRoomRequest, DeliveryState, Message, Room};
use crate::services::{PresenceEntry, RoomDirectory, TypingDebouncer, TypingTracker};
use crate::store::ConversationStore;
use crate::types::{ChatResult, ClientEvent, ErrorCode, ServerEvent};
use crate::utils::Validator;

const NOTIFICATION_CAPACITY: usize = 256;

/// State changes published to whoever renders the conversations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotification {
    Connected { connection_id: String },
    Disconnected,
    /// The message list of a conversation changed
    ConversationChanged { key: ConversationKey },
    /// The typing indicator of a conversation changed; `None` once it cleared
    TypingChanged {
        key: ConversationKey,
        user_id: Option<String>,
    },
    RoomsChanged,
    RoomDeleted { room_id: String },
    ServerError { code: ErrorCode, message: String },
}

pub(crate) struct ClientInner<T, A> {
    pub(crate) actor: Actor,
    pub(crate) gateway: ChannelGateway<T>,
    pub(crate) api: A,
    pub(crate) store: Mutex<ConversationStore>,
    pub(crate) presence: Mutex<TypingTracker>,
    pub(crate) debouncer: Mutex<TypingDebouncer>,
    pub(crate) rooms: Mutex<RoomDirectory>,
    notifications: broadcast::Sender<ClientNotification>,
}

impl<T, A> ClientInner<T, A> {
    pub(crate) fn notify(&self, notification: ClientNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }
}

/// One user's live view of their conversations.
///
/// Inbound frames are applied one at a time through [`ChatClient::handle_event`];
/// local state sits behind short-lived locks that are never held across an await.
pub struct ChatClient<T, A> {
    pub(crate) inner: Arc<ClientInner<T, A>>,
}

impl<T, A> Clone for ChatClient<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, A> ChatClient<T, A>
where
    T: Transport + 'static,
    A: ConversationApi + 'static,
{
    pub fn new(
        actor: Actor,
        transport: T,
        api: A,
        typing_cooldown: Duration,
        typing_timeout: Duration,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            inner: Arc::new(ClientInner {
                actor,
                gateway: ChannelGateway::new(transport),
                api,
                store: Mutex::new(ConversationStore::new()),
                presence: Mutex::new(TypingTracker::new(typing_timeout)),
                debouncer: Mutex::new(TypingDebouncer::new(typing_cooldown)),
                rooms: Mutex::new(RoomDirectory::new()),
                notifications,
            }),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.inner.actor
    }

    pub fn gateway(&self) -> &ChannelGateway<T> {
        &self.inner.gateway
    }

    pub fn api(&self) -> &A {
        &self.inner.api
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientNotification> {
        self.inner.notifications.subscribe()
    }

    /// Handle for one conversation; nothing is joined until `open()`.
    pub fn session(&self, key: ConversationKey) -> ConversationSession<T, A> {
        ConversationSession::new(self.clone(), key)
    }

    /// Apply inbound frames until the connection's stream ends, clearing
    /// typing indicators as their deadlines pass.
    pub async fn run(self, mut inbound: mpsc::Receiver<ServerEvent>) {
        loop {
            let deadline = lock(&self.inner.presence).next_deadline();
            let expiry = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = expiry => {
                    self.sweep_typing(Instant::now());
                }
            }
        }
        self.handle_disconnected();
    }

    pub fn handle_event(&self, event: ServerEvent) {
        self.handle_event_at(event, Instant::now());
    }

    /// Apply one inbound frame; `now` feeds typing deadlines.
    pub fn handle_event_at(&self, event: ServerEvent, now: Instant) {
        debug!(event = event.event_type_name(), "handling server event");
        match event {
            ServerEvent::Connected { connection_id } => {
                info!(connection_id = %connection_id, "connected to gateway");
                self.inner
                    .notify(ClientNotification::Connected { connection_id });
            }
            ServerEvent::Ack { ack, outcome } => {
                self.inner.gateway.resolve_ack(ack, outcome);
            }
            ServerEvent::MessageReceived { message } | ServerEvent::RoomMessageReceived { message } => {
                let key = message.conversation.clone();
                let outcome = lock(&self.inner.store).merge_confirmed(message);
                if outcome.changed() {
                    self.inner
                        .notify(ClientNotification::ConversationChanged { key });
                }
            }
            ServerEvent::Typing {
                conversation_id,
                user_id,
            } => self.observe_typing(ConversationKey::task(conversation_id), user_id, None, now),
            ServerEvent::RoomTyping {
                room_id,
                user_id,
                user_name,
            } => self.observe_typing(ConversationKey::room(room_id), user_id, user_name, now),
            ServerEvent::RoomMessageDelivered {
                room_id,
                message_id,
            } => self.apply_delivery(ConversationKey::room(room_id), &message_id, DeliveryState::Delivered),
            ServerEvent::RoomMessageRead {
                room_id,
                message_id,
            } => self.apply_delivery(ConversationKey::room(room_id), &message_id, DeliveryState::Read),
            ServerEvent::RoomMessageEdited { message } => {
                let key = message.conversation.clone();
                let applied = lock(&self.inner.store)
                    .get_mut(&key)
                    .map(|state| state.apply_edit(&message).is_ok())
                    .unwrap_or(false);
                if applied {
                    self.inner
                        .notify(ClientNotification::ConversationChanged { key });
                }
            }
            ServerEvent::RoomMessageDeleted {
                room_id,
                message_id,
            } => {
                let key = ConversationKey::room(room_id);
                let removed = lock(&self.inner.store)
                    .get_mut(&key)
                    .map(|state| state.remove(&message_id).is_ok())
                    .unwrap_or(false);
                if removed {
                    self.inner
                        .notify(ClientNotification::ConversationChanged { key });
                }
            }
            ServerEvent::RoomDeleted { room_id } => self.apply_room_deleted(&room_id),
            ServerEvent::Joined { kind, id } | ServerEvent::Left { kind, id } => {
                debug!(channel = %ConversationKey::new(kind, id), "membership update");
            }
            ServerEvent::Error { code, message } => {
                warn!(code = code.as_str(), message = %message, "gateway reported an error");
                self.inner
                    .notify(ClientNotification::ServerError { code, message });
            }
            ServerEvent::Pong => {}
        }
    }

    /// Connection lost: pending acks fail and channel memberships are gone.
    /// Conversation state stays until sessions close or re-open.
    pub fn handle_disconnected(&self) {
        info!("disconnected from gateway");
        self.inner.gateway.handle_disconnect();
        self.inner.notify(ClientNotification::Disconnected);
    }

    fn observe_typing(
        &self,
        key: ConversationKey,
        user_id: String,
        user_name: Option<String>,
        now: Instant,
    ) {
        if user_id == self.inner.actor.user_id {
            return;
        }
        lock(&self.inner.presence).observe(key.clone(), user_id.clone(), user_name, now);
        self.inner.notify(ClientNotification::TypingChanged {
            key,
            user_id: Some(user_id),
        });
    }

    fn apply_delivery(&self, key: ConversationKey, message_id: &str, state: DeliveryState) {
        let advanced = lock(&self.inner.store)
            .get_mut(&key)
            .and_then(|conversation| conversation.advance_delivery(message_id, state).ok())
            .unwrap_or(false);
        if advanced {
            self.inner
                .notify(ClientNotification::ConversationChanged { key });
        }
    }

    fn apply_room_deleted(&self, room_id: &str) {
        let key = ConversationKey::room(room_id);
        let cached = lock(&self.inner.rooms).remove(room_id).is_some();
        let was_open = lock(&self.inner.store).close(&key).is_some();
        lock(&self.inner.presence).clear(&key);
        lock(&self.inner.debouncer).reset(&key);
        self.inner.gateway.forget(&key);

        info!(room_id, cached, was_open, "room deleted");
        self.inner.notify(ClientNotification::RoomDeleted {
            room_id: room_id.to_string(),
        });
        if cached {
            self.inner.notify(ClientNotification::RoomsChanged);
        }
    }

    /// Messages of an open conversation, oldest first.
    pub fn messages(&self, key: &ConversationKey) -> Option<Vec<Message>> {
        lock(&self.inner.store)
            .get(key)
            .map(|state| state.messages().to_vec())
    }

    /// Current typer of a conversation, if any.
    pub fn typing(&self, key: &ConversationKey, now: Instant) -> Option<PresenceEntry> {
        lock(&self.inner.presence).current(key, now).cloned()
    }

    /// Drop expired typing indicators and publish which ones cleared.
    pub fn sweep_typing(&self, now: Instant) -> Vec<ConversationKey> {
        let cleared = lock(&self.inner.presence).sweep(now);
        for key in &cleared {
            self.inner.notify(ClientNotification::TypingChanged {
                key: key.clone(),
                user_id: None,
            });
        }
        cleared
    }

    pub fn rooms(&self) -> Vec<Room> {
        lock(&self.inner.rooms).list().to_vec()
    }

    /// Reload the room list from the server.
    pub async fn refresh_rooms(&self) -> ChatResult<Vec<Room>> {
        let rooms = self.inner.api.list_rooms().await?;
        lock(&self.inner.rooms).replace_all(rooms.clone());
        self.inner.notify(ClientNotification::RoomsChanged);
        Ok(rooms)
    }

    pub async fn create_room(&self, request: CreateRoomRequest) -> ChatResult<Room> {
        Validator::create_room(&request)?;
        let room = self.inner.api.create_room(&request).await?;
        lock(&self.inner.rooms).upsert(room.clone());
        self.inner.notify(ClientNotification::RoomsChanged);
        Ok(room)
    }

    /// Ask the gateway to delete a room. The room disappears locally once
    /// `roomDeleted` comes back.
    pub async fn delete_room(&self, room_id: &str) -> ChatResult<()> {
        let pending = self.inner.gateway.emit_with_ack(ClientEvent::DeleteRoomEntity {
            room_id: room_id.to_string(),
        })?;
        pending.outcome().await?.into_result()?;
        Ok(())
    }

    /// Keys of every open conversation.
    pub fn open_conversations(&self) -> Vec<ConversationKey> {
        lock(&self.inner.store).open_keys()
    }
}
