use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a multi-member room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Public room identifier
    pub id: String,
    /// Owning tenant
    pub tenant_id: String,
    /// Display name
    pub name: String,
    /// User who created the room; the only one allowed to delete it
    pub creator_id: String,
    /// Members, creator included
    pub member_ids: BTreeSet<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Create a new room; the creator is always a member.
    pub fn new(
        tenant_id: impl Into<String>,
        creator_id: impl Into<String>,
        name: impl Into<String>,
        member_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        let creator_id = creator_id.into();
        let mut members: BTreeSet<String> = member_ids.into_iter().collect();
        members.insert(creator_id.clone());

        Self {
            id: cuid2::create_id(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            creator_id,
            member_ids: members,
            created_at: Utc::now(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_ids.contains(user_id)
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }
}

/// Request to create a new room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    /// Room name
    pub name: String,
    /// Initial members besides the creator
    #[serde(default)]
    pub member_ids: Vec<String>,
}
