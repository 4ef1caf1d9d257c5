//! Typing presence.
//!
//! Receivers keep a single most-recent typer per conversation with a
//! monotonic deadline; senders throttle their own typing signals. Both take
//! the current [`Instant`] from the caller so no timer is owned here.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::entities::ConversationKey;

/// Who is typing in a conversation, and until when the indicator stays up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub user_id: String,
    pub user_name: Option<String>,
    pub deadline: Instant,
}

impl PresenceEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Receiver-side typing indicator state
#[derive(Debug)]
pub struct TypingTracker {
    timeout: Duration,
    entries: HashMap<ConversationKey, PresenceEntry>,
}

impl TypingTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a typing signal; overwrites any previous typer of the conversation.
    pub fn observe(
        &mut self,
        key: ConversationKey,
        user_id: impl Into<String>,
        user_name: Option<String>,
        now: Instant,
    ) -> &PresenceEntry {
        let entry = PresenceEntry {
            user_id: user_id.into(),
            user_name,
            deadline: now + self.timeout,
        };
        debug!(conversation = %key, user_id = %entry.user_id, "typing observed");

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(entry),
        }
    }

    /// Current typer, if the indicator has not expired.
    pub fn current(&self, key: &ConversationKey, now: Instant) -> Option<&PresenceEntry> {
        self.entries.get(key).filter(|entry| entry.is_live(now))
    }

    pub fn clear(&mut self, key: &ConversationKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove expired entries and report which conversations lost their indicator.
    pub fn sweep(&mut self, now: Instant) -> Vec<ConversationKey> {
        let expired: Vec<ConversationKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Earliest deadline still pending, for scheduling the next sweep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.deadline).min()
    }
}

/// Sender-side throttle: at most one typing emit per conversation per cooldown
#[derive(Debug)]
pub struct TypingDebouncer {
    cooldown: Duration,
    last_emitted: HashMap<ConversationKey, Instant>,
}

impl TypingDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: HashMap::new(),
        }
    }

    /// Whether a typing signal should go out now; records the emit when it should.
    pub fn should_emit(&mut self, key: &ConversationKey, now: Instant) -> bool {
        if let Some(last) = self.last_emitted.get(key) {
            if now.saturating_duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last_emitted.insert(key.clone(), now);
        true
    }

    pub fn reset(&mut self, key: &ConversationKey) {
        self.last_emitted.remove(key);
    }
}
