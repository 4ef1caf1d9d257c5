//! Row mapping between SQLite rows and domain entities.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use huddle_chats::{
    AttachmentRef, ChatResult, ConversationKey, ConversationKind, DeliveryState, Message, Room,
    TaskConversation,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::types::{db_error, DatabaseError};

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_kind, conversation_id, sender_id, sender_name, body, temp_id, delivery, edited, attachment_id, attachment_name, created_at";

/// Current time at the precision stored in the database.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 text; sorts the same as the instant it encodes.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> ChatResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| DatabaseError::CorruptRow(format!("timestamp '{}': {}", value, err)).into())
}

pub(crate) fn message_from_row(row: &SqliteRow) -> ChatResult<Message> {
    let kind: String = row.try_get("conversation_kind").map_err(db_error)?;
    let kind: ConversationKind = kind.parse()?;
    let delivery: String = row.try_get("delivery").map_err(db_error)?;
    let created_at: String = row.try_get("created_at").map_err(db_error)?;
    let attachment_id: Option<String> = row.try_get("attachment_id").map_err(db_error)?;
    let attachment_name: Option<String> = row.try_get("attachment_name").map_err(db_error)?;

    Ok(Message {
        id: Some(row.try_get("id").map_err(db_error)?),
        temp_id: row.try_get("temp_id").map_err(db_error)?,
        conversation: ConversationKey::new(
            kind,
            row.try_get::<String, _>("conversation_id").map_err(db_error)?,
        ),
        sender_id: row.try_get("sender_id").map_err(db_error)?,
        sender_name: row.try_get("sender_name").map_err(db_error)?,
        body: row.try_get("body").map_err(db_error)?,
        created_at: parse_timestamp(&created_at)?,
        delivery: DeliveryState::from(delivery.as_str()),
        edited: row.try_get("edited").map_err(db_error)?,
        attachment: match (attachment_id, attachment_name) {
            (Some(id), Some(name)) => Some(AttachmentRef { id, name }),
            _ => None,
        },
    })
}

pub(crate) fn task_from_row(row: &SqliteRow) -> ChatResult<TaskConversation> {
    Ok(TaskConversation {
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        task_id: row.try_get("task_id").map_err(db_error)?,
        assignee_id: row.try_get("assignee_id").map_err(db_error)?,
        assigner_id: row.try_get("assigner_id").map_err(db_error)?,
    })
}

/// Room row without members; callers fill `member_ids`.
pub(crate) fn room_from_row(row: &SqliteRow) -> ChatResult<Room> {
    let created_at: String = row.try_get("created_at").map_err(db_error)?;
    Ok(Room {
        id: row.try_get("id").map_err(db_error)?,
        tenant_id: row.try_get("tenant_id").map_err(db_error)?,
        name: row.try_get("name").map_err(db_error)?,
        creator_id: row.try_get("creator_id").map_err(db_error)?,
        member_ids: Default::default(),
        created_at: parse_timestamp(&created_at)?,
    })
}
