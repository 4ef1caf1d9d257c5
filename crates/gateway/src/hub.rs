//! Live channel fan-out.
//!
//! Every conversation channel owns one `broadcast` sender. A connection that
//! joins a channel gets a forwarding task which copies the channel's events
//! into the connection's outbound queue, skipping events the connection
//! originated itself.

use std::collections::HashMap;

use huddle_chats::{types::ConnectionId, Actor, ConversationKey, ServerEvent};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Event published on a channel together with the connection that caused it
#[derive(Debug, Clone)]
pub struct Routed {
    pub origin: Option<ConnectionId>,
    pub event: ServerEvent,
}

struct ConnectionEntry {
    actor: Actor,
    outbound: mpsc::Sender<ServerEvent>,
    forwarders: HashMap<ConversationKey, JoinHandle<()>>,
}

/// Registry of live connections and the channels they joined
pub struct ChannelHub {
    capacity: usize,
    channels: RwLock<HashMap<ConversationKey, broadcast::Sender<Routed>>>,
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Track a new connection and the queue its writer drains.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        actor: Actor,
        outbound: mpsc::Sender<ServerEvent>,
    ) {
        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id.clone(),
            ConnectionEntry {
                actor,
                outbound,
                forwarders: HashMap::new(),
            },
        );
        debug!(connection_id = %connection_id, "connection registered");
    }

    /// Drop a connection and stop all of its forwarders.
    pub async fn unregister(&self, connection_id: &str) {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.remove(connection_id) else {
            return;
        };

        let mut channels = self.channels.write().await;
        for (key, forwarder) in entry.forwarders {
            forwarder.abort();
            release_if_idle(&connections, &mut channels, &key);
        }
        debug!(
            connection_id,
            user_id = %entry.actor.user_id,
            "connection unregistered"
        );
    }

    /// Add the connection to a channel. Returns `false` when it was already
    /// a member or is not registered.
    pub async fn subscribe(&self, connection_id: &str, key: &ConversationKey) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(connection_id) else {
            return false;
        };
        if entry.forwarders.contains_key(key) {
            return false;
        }

        let receiver = {
            let mut channels = self.channels.write().await;
            channels
                .entry(key.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let forwarder = tokio::spawn(forward(
            connection_id.to_string(),
            key.clone(),
            receiver,
            entry.outbound.clone(),
        ));
        entry.forwarders.insert(key.clone(), forwarder);
        debug!(connection_id, channel = %key, "joined channel");
        true
    }

    /// Remove the connection from a channel. Returns `false` when it was not
    /// a member.
    pub async fn unsubscribe(&self, connection_id: &str, key: &ConversationKey) -> bool {
        let mut connections = self.connections.write().await;
        let Some(forwarder) = connections
            .get_mut(connection_id)
            .and_then(|entry| entry.forwarders.remove(key))
        else {
            return false;
        };
        forwarder.abort();
        release_if_idle(&connections, &mut *self.channels.write().await, key);
        debug!(connection_id, channel = %key, "left channel");
        true
    }

    /// Publish an event to every member of a channel except `origin`.
    /// Returns the number of subscribed forwarders.
    pub async fn broadcast(
        &self,
        key: &ConversationKey,
        origin: Option<&str>,
        event: ServerEvent,
    ) -> usize {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(key) else {
            return 0;
        };
        let routed = Routed {
            origin: origin.map(str::to_string),
            event,
        };
        sender.send(routed).unwrap_or(0)
    }

    /// Close a channel. Forwarders deliver what is already buffered and then
    /// stop; no connection is a member afterwards.
    pub async fn evict(&self, key: &ConversationKey) {
        let removed = self.channels.write().await.remove(key);
        let mut evicted = 0usize;
        for entry in self.connections.write().await.values_mut() {
            if entry.forwarders.remove(key).is_some() {
                evicted += 1;
            }
        }
        drop(removed);
        info!(channel = %key, evicted, "channel evicted");
    }

    pub async fn is_member(&self, connection_id: &str, key: &ConversationKey) -> bool {
        self.connections
            .read()
            .await
            .get(connection_id)
            .map(|entry| entry.forwarders.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of connections currently joined to a channel.
    pub async fn member_count(&self, key: &ConversationKey) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|entry| entry.forwarders.contains_key(key))
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Conversations with a live broadcast channel
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// Drop a channel's sender once no connection is joined to it.
fn release_if_idle(
    connections: &HashMap<ConnectionId, ConnectionEntry>,
    channels: &mut HashMap<ConversationKey, broadcast::Sender<Routed>>,
    key: &ConversationKey,
) {
    let joined = connections
        .values()
        .any(|entry| entry.forwarders.contains_key(key));
    if !joined && channels.remove(key).is_some() {
        debug!(channel = %key, "channel released");
    }
}

async fn forward(
    connection_id: ConnectionId,
    key: ConversationKey,
    mut receiver: broadcast::Receiver<Routed>,
    outbound: mpsc::Sender<ServerEvent>,
) {
    loop {
        match receiver.recv().await {
            Ok(routed) => {
                if routed.origin.as_deref() == Some(connection_id.as_str()) {
                    continue;
                }
                if outbound.send(routed.event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    connection_id = %connection_id,
                    channel = %key,
                    skipped,
                    "connection lagged behind channel"
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(connection_id = %connection_id, channel = %key, "forwarder stopped");
}
