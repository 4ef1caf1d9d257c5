use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::entities::ConversationKey;
use crate::types::{AckOutcome, ChatError, ChatResult, ClientEvent, ClientFrame};

/// Outbound half of a live connection.
///
/// `send` hands a frame to the connection without waiting for the network
/// and fails with [`ChatError::Transport`] when the connection is down.
pub trait Transport: Send + Sync {
    fn send(&self, frame: ClientFrame) -> ChatResult<()>;

    fn is_connected(&self) -> bool;
}

/// Acknowledgement that has not arrived yet
#[derive(Debug)]
pub struct PendingAck {
    ack: u64,
    receiver: oneshot::Receiver<AckOutcome>,
}

impl PendingAck {
    pub fn ack_id(&self) -> u64 {
        self.ack
    }

    /// Wait for the server's answer. Resolves with a transport error when the
    /// connection drops first.
    pub async fn outcome(self) -> ChatResult<AckOutcome> {
        self.receiver
            .await
            .map_err(|_| ChatError::transport("connection closed before acknowledgement"))
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ack bookkeeping and channel membership for one connection
pub struct ChannelGateway<T> {
    transport: T,
    next_ack: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<AckOutcome>>>,
    memberships: Mutex<HashSet<ConversationKey>>,
}

impl<T: Transport> ChannelGateway<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_ack: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashSet::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Fire-and-forget emit.
    pub fn emit(&self, event: ClientEvent) -> ChatResult<()> {
        debug!(event = event.event_type_name(), "emitting");
        self.transport.send(ClientFrame::new(event))
    }

    /// Emit and register for the matching `ack` frame.
    pub fn emit_with_ack(&self, event: ClientEvent) -> ChatResult<PendingAck> {
        let ack = self.next_ack.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(ack, tx);

        debug!(event = event.event_type_name(), ack, "emitting with ack");
        if let Err(err) = self.transport.send(ClientFrame::with_ack(ack, event)) {
            lock(&self.pending).remove(&ack);
            return Err(err);
        }

        Ok(PendingAck { ack, receiver: rx })
    }

    /// Route an `ack` frame to its waiter; returns false for unknown ack ids.
    pub fn resolve_ack(&self, ack: u64, outcome: AckOutcome) -> bool {
        match lock(&self.pending).remove(&ack) {
            Some(waiter) => {
                // The waiter may have been dropped; nothing to do then.
                let _ = waiter.send(outcome);
                true
            }
            None => {
                debug!(ack, "ack without a waiter");
                false
            }
        }
    }

    /// Join a channel. Membership is recorded only once the server grants it.
    pub async fn join(&self, key: &ConversationKey) -> ChatResult<()> {
        if self.is_joined(key) {
            return Ok(());
        }

        let pending = self.emit_with_ack(ClientEvent::Join {
            kind: key.kind,
            id: key.id.clone(),
        })?;

        match pending.outcome().await?.into_result() {
            Ok(_) => {
                lock(&self.memberships).insert(key.clone());
                debug!(channel = %key, "joined channel");
                Ok(())
            }
            Err(err) => {
                warn!(channel = %key, error = %err, "join refused");
                Err(err)
            }
        }
    }

    /// Leave a channel; leaving one that was never joined does nothing.
    pub fn leave(&self, key: &ConversationKey) -> ChatResult<()> {
        if !lock(&self.memberships).remove(key) {
            return Ok(());
        }

        match self.emit(ClientEvent::Leave {
            kind: key.kind,
            id: key.id.clone(),
        }) {
            Ok(()) => Ok(()),
            // The server drops memberships with the connection.
            Err(ChatError::Transport { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn is_joined(&self, key: &ConversationKey) -> bool {
        lock(&self.memberships).contains(key)
    }

    pub fn memberships(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<_> = lock(&self.memberships).iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop a membership the server already ended, e.g. after `roomDeleted`.
    pub fn forget(&self, key: &ConversationKey) -> bool {
        lock(&self.memberships).remove(key)
    }

    /// Connection lost: fail every pending ack and clear memberships.
    pub fn handle_disconnect(&self) {
        let dropped: Vec<_> = lock(&self.pending).drain().collect();
        let channels = {
            let mut memberships = lock(&self.memberships);
            let count = memberships.len();
            memberships.clear();
            count
        };
        // Dropping the senders resolves each waiter with a transport error.
        drop(dropped);
        debug!(channels, "cleared channel state after disconnect");
    }
}
