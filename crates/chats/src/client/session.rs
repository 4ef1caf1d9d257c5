use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::ConversationApi;
use super::chat_client::{ChatClient, ClientNotification};
use super::gateway::{lock, Transport};
use crate::entities::{ConversationKey, ConversationKind, DeliveryState, Message};
use crate::repositories::HistoryQuery;
use crate::services::PresenceEntry;
use crate::types::{ChatError, ChatResult, ClientEvent};
use crate::utils::Validator;

fn not_open(key: &ConversationKey) -> ChatError {
    ChatError::validation(format!("conversation {} is not open", key))
}

/// Lifecycle handle for one conversation.
///
/// `open()` joins the channel and loads history, `close()` leaves it and
/// drops the local state. Both are called explicitly by the application.
pub struct ConversationSession<T, A> {
    client: ChatClient<T, A>,
    key: ConversationKey,
}

impl<T, A> Clone for ConversationSession<T, A> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            key: self.key.clone(),
        }
    }
}

impl<T, A> ConversationSession<T, A>
where
    T: Transport + 'static,
    A: ConversationApi + 'static,
{
    pub(crate) fn new(client: ChatClient<T, A>, key: ConversationKey) -> Self {
        Self { client, key }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn is_open(&self) -> bool {
        lock(&self.client.inner.store).is_open(&self.key)
    }

    /// Join the channel and merge the latest history page.
    ///
    /// The local state exists before the join is granted so broadcasts that
    /// race the join ack are not lost. A refused join or a failed history
    /// load removes it again unless it was already open.
    pub async fn open(&self) -> ChatResult<()> {
        let inner = &self.client.inner;
        let was_open = {
            let mut store = lock(&inner.store);
            let was_open = store.is_open(&self.key);
            store.open(self.key.clone());
            was_open
        };

        if let Err(err) = inner.gateway.join(&self.key).await {
            if !was_open {
                lock(&inner.store).close(&self.key);
            }
            return Err(err);
        }

        let history = match inner
            .api
            .fetch_history(&self.key, &HistoryQuery::default())
            .await
        {
            Ok(history) => history,
            Err(err) => {
                warn!(conversation = %self.key, error = %err, "history load failed");
                if !was_open {
                    lock(&inner.store).close(&self.key);
                    if let Err(leave_err) = inner.gateway.leave(&self.key) {
                        warn!(conversation = %self.key, error = %leave_err, "leave after failed open");
                    }
                }
                return Err(err);
            }
        };

        let added = lock(&inner.store)
            .get_mut(&self.key)
            .map(|state| state.load_history(history))
            .unwrap_or(0);
        info!(conversation = %self.key, added, "conversation opened");
        inner.notify(ClientNotification::ConversationChanged {
            key: self.key.clone(),
        });
        Ok(())
    }

    /// Leave the channel and drop local state, presence, and typing throttle.
    pub fn close(&self) -> ChatResult<()> {
        let inner = &self.client.inner;
        inner.gateway.leave(&self.key)?;
        lock(&inner.store).close(&self.key);
        lock(&inner.presence).clear(&self.key);
        lock(&inner.debouncer).reset(&self.key);
        debug!(conversation = %self.key, "conversation closed");
        inner.notify(ClientNotification::ConversationChanged {
            key: self.key.clone(),
        });
        Ok(())
    }

    /// Send a message optimistically.
    ///
    /// The pending entry shows up at once; the acknowledged record replaces
    /// it. A failed emit or a rejected ack is returned and the pending entry
    /// stays as it is.
    pub async fn send(&self, body: &str) -> ChatResult<Message> {
        Validator::message_body(body)?;
        let inner = &self.client.inner;

        let temp_id = Uuid::new_v4().to_string();
        let pending = Message::pending(
            self.key.clone(),
            inner.actor.user_id.clone(),
            inner.actor.display_name.clone(),
            body,
            temp_id.clone(),
            Utc::now(),
        );
        {
            let mut store = lock(&inner.store);
            let state = store.get_mut(&self.key).ok_or_else(|| not_open(&self.key))?;
            state.insert_pending(pending)?;
        }
        inner.notify(ClientNotification::ConversationChanged {
            key: self.key.clone(),
        });

        let event = match self.key.kind {
            ConversationKind::Task => ClientEvent::SendMessage {
                conversation_id: self.key.id.clone(),
                body: body.to_string(),
                temp_id: temp_id.clone(),
            },
            ConversationKind::Room => ClientEvent::SendRoomMessage {
                room_id: self.key.id.clone(),
                body: body.to_string(),
                temp_id: temp_id.clone(),
            },
        };

        let ack = inner.gateway.emit_with_ack(event)?;
        let record = ack
            .outcome()
            .await?
            .into_result()?
            .ok_or_else(|| ChatError::internal("send acknowledged without a record"))?;

        let outcome = lock(&inner.store).merge_confirmed(record.clone());
        debug!(conversation = %self.key, temp_id = %temp_id, ?outcome, "send acknowledged");
        if outcome.changed() {
            inner.notify(ClientNotification::ConversationChanged {
                key: self.key.clone(),
            });
        }
        Ok(record)
    }

    /// Flag a pending send as failed.
    pub fn mark_failed(&self, temp_id: &str) -> ChatResult<()> {
        let inner = &self.client.inner;
        lock(&inner.store)
            .get_mut(&self.key)
            .ok_or_else(|| not_open(&self.key))?
            .mark_failed(temp_id)?;
        inner.notify(ClientNotification::ConversationChanged {
            key: self.key.clone(),
        });
        Ok(())
    }

    /// Edit one of our messages; the list keeps its order.
    pub async fn edit(&self, message_id: &str, body: &str) -> ChatResult<Message> {
        Validator::message_body(body)?;
        let inner = &self.client.inner;
        let record = inner.api.edit_message(message_id, body).await?;

        let applied = lock(&inner.store)
            .get_mut(&self.key)
            .map(|state| state.apply_edit(&record).is_ok())
            .unwrap_or(false);
        if applied {
            inner.notify(ClientNotification::ConversationChanged {
                key: self.key.clone(),
            });
        }
        Ok(record)
    }

    /// Delete a message. A second delete of the same id fails on the server
    /// and removes nothing.
    pub async fn delete(&self, message_id: &str) -> ChatResult<()> {
        let inner = &self.client.inner;
        inner.api.delete_message(message_id).await?;

        let removed = lock(&inner.store)
            .get_mut(&self.key)
            .map(|state| state.remove(message_id).is_ok())
            .unwrap_or(false);
        if removed {
            inner.notify(ClientNotification::ConversationChanged {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    pub fn notify_typing(&self) -> ChatResult<bool> {
        self.notify_typing_at(Instant::now())
    }

    /// Emit a typing signal unless one went out within the cooldown.
    /// Returns whether a signal was sent.
    pub fn notify_typing_at(&self, now: Instant) -> ChatResult<bool> {
        let inner = &self.client.inner;
        if !lock(&inner.debouncer).should_emit(&self.key, now) {
            return Ok(false);
        }

        let user_id = inner.actor.user_id.clone();
        let event = match self.key.kind {
            ConversationKind::Task => ClientEvent::Typing {
                conversation_id: self.key.id.clone(),
                user_id,
            },
            ConversationKind::Room => ClientEvent::RoomTyping {
                room_id: self.key.id.clone(),
                user_id,
                user_name: inner.actor.display_name.clone(),
            },
        };
        inner.gateway.emit(event)?;
        Ok(true)
    }

    /// Tell the room a message reached this client.
    pub fn mark_delivered(&self, message_id: &str) -> ChatResult<()> {
        self.receipt(message_id, DeliveryState::Delivered)
    }

    /// Tell the room a message was read.
    pub fn mark_read(&self, message_id: &str) -> ChatResult<()> {
        self.receipt(message_id, DeliveryState::Read)
    }

    fn receipt(&self, message_id: &str, state: DeliveryState) -> ChatResult<()> {
        if !self.key.is_room() {
            return Err(ChatError::validation(
                "delivery receipts are only tracked for rooms",
            ));
        }
        let room_id = self.key.id.clone();
        let message_id_owned = message_id.to_string();
        let event = match state {
            DeliveryState::Read => ClientEvent::RoomMessageRead {
                room_id,
                message_id: message_id_owned,
            },
            _ => ClientEvent::RoomMessageDelivered {
                room_id,
                message_id: message_id_owned,
            },
        };
        let inner = &self.client.inner;
        inner.gateway.emit(event)?;

        let advanced = lock(&inner.store)
            .get_mut(&self.key)
            .and_then(|conversation| conversation.advance_delivery(message_id, state).ok())
            .unwrap_or(false);
        if advanced {
            inner.notify(ClientNotification::ConversationChanged {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Current message list; empty when the session is not open.
    pub fn messages(&self) -> Vec<Message> {
        self.client.messages(&self.key).unwrap_or_default()
    }

    pub fn typing(&self, now: Instant) -> Option<PresenceEntry> {
        self.client.typing(&self.key, now)
    }
}
