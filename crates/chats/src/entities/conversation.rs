use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::room::Room;
use crate::types::ChatError;

/// Shape of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// One-to-one conversation attached to a task
    Task,
    /// Multi-member room
    Room,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Task => "task",
            ConversationKind::Room => "room",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationKind {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(ConversationKind::Task),
            "room" => Ok(ConversationKind::Room),
            other => Err(ChatError::validation(format!(
                "unknown conversation kind '{}'",
                other
            ))),
        }
    }
}

/// Identifies one conversation and, through [`ConversationKey::channel_key`],
/// its live channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub kind: ConversationKind,
    pub id: String,
}

impl ConversationKey {
    pub fn new(kind: ConversationKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(ConversationKind::Task, id)
    }

    pub fn room(id: impl Into<String>) -> Self {
        Self::new(ConversationKind::Room, id)
    }

    /// Channel key string, `"{kind}:{id}"`.
    pub fn channel_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    pub fn is_room(&self) -> bool {
        self.kind == ConversationKind::Room
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ConversationKey {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ChatError::validation(format!("invalid channel key '{}'", s)))?;
        if id.is_empty() {
            return Err(ChatError::validation("channel key is missing an id"));
        }
        Ok(Self::new(kind.parse()?, id))
    }
}

/// Conversation attached to a task between its assignee and assigner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConversation {
    /// Owning tenant
    pub tenant_id: String,
    /// Task identifier, doubles as the conversation id
    pub task_id: String,
    /// User the task is assigned to
    pub assignee_id: String,
    /// User who assigned the task
    pub assigner_id: String,
}

impl TaskConversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.assignee_id == user_id || self.assigner_id == user_id
    }
}

/// Either conversation shape, as resolved by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Conversation {
    Task(TaskConversation),
    Room(Room),
}

impl Conversation {
    pub fn key(&self) -> ConversationKey {
        match self {
            Conversation::Task(task) => ConversationKey::task(task.task_id.clone()),
            Conversation::Room(room) => ConversationKey::room(room.id.clone()),
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            Conversation::Task(task) => &task.tenant_id,
            Conversation::Room(room) => &room.tenant_id,
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        match self {
            Conversation::Task(task) => task.has_participant(user_id),
            Conversation::Room(room) => room.is_member(user_id),
        }
    }

    /// Room creator; task conversations have none.
    pub fn creator_id(&self) -> Option<&str> {
        match self {
            Conversation::Task(_) => None,
            Conversation::Room(room) => Some(&room.creator_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_is_kind_and_id() {
        assert_eq!(ConversationKey::task("42").channel_key(), "task:42");
        assert_eq!(ConversationKey::room("r1").to_string(), "room:r1");
    }

    #[test]
    fn channel_key_parses_back() {
        let key: ConversationKey = "room:abc:def".parse().unwrap();
        assert_eq!(key, ConversationKey::room("abc:def"));

        assert!("lobby:1".parse::<ConversationKey>().is_err());
        assert!("task:".parse::<ConversationKey>().is_err());
        assert!("task".parse::<ConversationKey>().is_err());
    }

    #[test]
    fn task_participants_are_assignee_and_assigner() {
        let task = Conversation::Task(TaskConversation {
            tenant_id: "t1".into(),
            task_id: "42".into(),
            assignee_id: "alice".into(),
            assigner_id: "bob".into(),
        });

        assert!(task.has_participant("alice"));
        assert!(task.has_participant("bob"));
        assert!(!task.has_participant("carol"));
        assert_eq!(task.creator_id(), None);
        assert_eq!(task.key(), ConversationKey::task("42"));
    }
}
