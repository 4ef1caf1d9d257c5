//! SQLite implementation of the chat storage contract.

use async_trait::async_trait;
use huddle_chats::{
    utils::PermissionChecker, Actor, ChatError, ChatRepository, ChatResult, Conversation,
    ConversationKey, ConversationKind, DeliveryState, HistoryQuery, Message, NewMessage, Room,
    TaskConversation,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use super::rows::{
    format_timestamp, message_from_row, now, room_from_row, task_from_row, MESSAGE_COLUMNS,
};
use crate::types::db_error;

/// Repository for conversations, rooms, and messages
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    /// Create a new repository over an initialised pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_task(&self, tenant_id: &str, task_id: &str) -> ChatResult<Option<TaskConversation>> {
        let row = sqlx::query(
            "SELECT tenant_id, task_id, assignee_id, assigner_id FROM tasks WHERE tenant_id = ? AND task_id = ?",
        )
        .bind(tenant_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, creator_id, created_at FROM rooms WHERE tenant_id = ? AND id = ?",
        )
        .bind(tenant_id)
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut room = room_from_row(&row)?;
        self.load_members(&mut room).await?;
        Ok(Some(room))
    }

    async fn load_members(&self, room: &mut Room) -> ChatResult<()> {
        let rows = sqlx::query("SELECT user_id FROM room_members WHERE tenant_id = ? AND room_id = ?")
            .bind(&room.tenant_id)
            .bind(&room.id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        room.member_ids = rows
            .iter()
            .map(|row| row.try_get::<String, _>("user_id").map_err(db_error))
            .collect::<ChatResult<_>>()?;
        Ok(())
    }

    async fn conversation(&self, tenant_id: &str, key: &ConversationKey) -> ChatResult<Conversation> {
        match key.kind {
            ConversationKind::Task => self
                .find_task(tenant_id, &key.id)
                .await?
                .map(Conversation::Task)
                .ok_or_else(|| ChatError::not_found("task", &key.id)),
            ConversationKind::Room => self
                .find_room(tenant_id, &key.id)
                .await?
                .map(Conversation::Room)
                .ok_or_else(|| ChatError::not_found("room", &key.id)),
        }
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn authorize(&self, actor: &Actor, key: &ConversationKey) -> ChatResult<Conversation> {
        let conversation = self.conversation(&actor.tenant_id, key).await?;
        if let Err(err) = PermissionChecker::can_access(actor, &conversation) {
            warn!(user_id = %actor.user_id, conversation = %key, "access refused");
            return Err(err);
        }
        Ok(conversation)
    }

    async fn create_message(&self, message: NewMessage) -> ChatResult<Message> {
        self.conversation(&message.tenant_id, &message.conversation)
            .await?;

        let id = cuid2::create_id();
        let created_at = now();
        let stamp = format_timestamp(&created_at);
        let tenant_id = message.tenant_id.clone();
        let record = Message::confirmed(message, id.clone(), created_at);
        let (attachment_id, attachment_name) = match &record.attachment {
            Some(attachment) => (Some(attachment.id.clone()), Some(attachment.name.clone())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO messages (id, tenant_id, conversation_kind, conversation_id, sender_id, sender_name, body, temp_id, delivery, edited, attachment_id, attachment_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&tenant_id)
        .bind(record.conversation.kind.as_str())
        .bind(&record.conversation.id)
        .bind(&record.sender_id)
        .bind(&record.sender_name)
        .bind(&record.body)
        .bind(&record.temp_id)
        .bind(record.delivery.as_str())
        .bind(attachment_id)
        .bind(attachment_name)
        .bind(&stamp)
        .bind(&stamp)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        info!(
            message_id = %id,
            conversation = %record.conversation,
            sender_id = %record.sender_id,
            "created new message"
        );
        Ok(record)
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        key: &ConversationKey,
        query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>> {
        self.conversation(tenant_id, key).await?;

        let cursor = match query.before_id.as_deref() {
            Some(message_id) => sqlx::query(
                "SELECT created_at, rowid AS seq FROM messages
                 WHERE tenant_id = ? AND conversation_kind = ? AND conversation_id = ? AND id = ?",
            )
            .bind(tenant_id)
            .bind(key.kind.as_str())
            .bind(&key.id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(|row| (row.get::<String, _>("created_at"), row.get::<i64, _>("seq"))),
            None => None,
        };

        let rows = match cursor {
            Some((created_at, rowid)) => {
                let sql = format!(
                    "SELECT {} FROM messages
                     WHERE tenant_id = ? AND conversation_kind = ? AND conversation_id = ?
                       AND (created_at < ? OR (created_at = ? AND rowid < ?))
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?",
                    MESSAGE_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(tenant_id)
                    .bind(key.kind.as_str())
                    .bind(&key.id)
                    .bind(&created_at)
                    .bind(&created_at)
                    .bind(rowid)
                    .bind(i64::from(query.effective_limit()))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error)?
            }
            None => {
                let before = query.before.as_ref().map(format_timestamp);
                let sql = format!(
                    "SELECT {} FROM messages
                     WHERE tenant_id = ? AND conversation_kind = ? AND conversation_id = ?
                       AND (? IS NULL OR created_at < ?)
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?",
                    MESSAGE_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(tenant_id)
                    .bind(key.kind.as_str())
                    .bind(&key.id)
                    .bind(&before)
                    .bind(&before)
                    .bind(i64::from(query.effective_limit()))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error)?
            }
        };

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<ChatResult<Vec<_>>>()?;
        messages.reverse();

        debug!(conversation = %key, count = messages.len(), "loaded message history");
        Ok(messages)
    }

    async fn get_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<Message> {
        let sql = format!(
            "SELECT {} FROM messages WHERE tenant_id = ? AND id = ?",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ChatError::not_found("message", message_id))?;

        message_from_row(&row)
    }

    async fn update_message_body(
        &self,
        tenant_id: &str,
        message_id: &str,
        body: &str,
    ) -> ChatResult<Message> {
        let result = sqlx::query(
            "UPDATE messages SET body = ?, edited = 1, updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(body)
        .bind(format_timestamp(&now()))
        .bind(tenant_id)
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(ChatError::not_found("message", message_id));
        }

        info!(message_id, "updated message body");
        self.get_message(tenant_id, message_id).await
    }

    async fn delete_message(&self, tenant_id: &str, message_id: &str) -> ChatResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(ChatError::not_found("message", message_id));
        }

        info!(message_id, "deleted message");
        Ok(())
    }

    async fn advance_delivery(
        &self,
        tenant_id: &str,
        message_id: &str,
        state: DeliveryState,
    ) -> ChatResult<Message> {
        let mut message = self.get_message(tenant_id, message_id).await?;
        if !message.advance(state) {
            return Ok(message);
        }

        sqlx::query("UPDATE messages SET delivery = ?, updated_at = ? WHERE tenant_id = ? AND id = ?")
            .bind(state.as_str())
            .bind(format_timestamp(&now()))
            .bind(tenant_id)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!(message_id, delivery = state.as_str(), "advanced delivery state");
        Ok(message)
    }

    async fn create_room(&self, mut room: Room) -> ChatResult<Room> {
        room.created_at = now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("INSERT INTO rooms (tenant_id, id, name, creator_id, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&room.tenant_id)
            .bind(&room.id)
            .bind(&room.name)
            .bind(&room.creator_id)
            .bind(format_timestamp(&room.created_at))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        for member in &room.member_ids {
            sqlx::query("INSERT INTO room_members (tenant_id, room_id, user_id) VALUES (?, ?, ?)")
                .bind(&room.tenant_id)
                .bind(&room.id)
                .bind(member)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        info!(
            room_id = %room.id,
            tenant_id = %room.tenant_id,
            members = room.member_ids.len(),
            "created new room"
        );
        Ok(room)
    }

    async fn list_rooms(&self, tenant_id: &str, user_id: &str) -> ChatResult<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT r.id, r.tenant_id, r.name, r.creator_id, r.created_at
             FROM rooms r
             JOIN room_members m ON m.tenant_id = r.tenant_id AND m.room_id = r.id
             WHERE r.tenant_id = ? AND m.user_id = ?
             ORDER BY r.created_at ASC",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut rooms = rows
            .iter()
            .map(room_from_row)
            .collect::<ChatResult<Vec<_>>>()?;
        for room in &mut rooms {
            self.load_members(room).await?;
        }
        Ok(rooms)
    }

    async fn get_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<Room> {
        self.find_room(tenant_id, room_id)
            .await?
            .ok_or_else(|| ChatError::not_found("room", room_id))
    }

    async fn delete_room(&self, tenant_id: &str, room_id: &str) -> ChatResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let messages = sqlx::query(
            "DELETE FROM messages WHERE tenant_id = ? AND conversation_kind = 'room' AND conversation_id = ?",
        )
        .bind(tenant_id)
        .bind(room_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM room_members WHERE tenant_id = ? AND room_id = ?")
            .bind(tenant_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let rooms = sqlx::query("DELETE FROM rooms WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if rooms.rows_affected() == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(ChatError::not_found("room", room_id));
        }

        tx.commit().await.map_err(db_error)?;
        info!(
            room_id,
            messages = messages.rows_affected(),
            "deleted room and its history"
        );
        Ok(())
    }

    async fn upsert_task(&self, task: TaskConversation) -> ChatResult<TaskConversation> {
        sqlx::query(
            "INSERT INTO tasks (tenant_id, task_id, assignee_id, assigner_id, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, task_id) DO UPDATE SET
                 assignee_id = excluded.assignee_id,
                 assigner_id = excluded.assigner_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&task.tenant_id)
        .bind(&task.task_id)
        .bind(&task.assignee_id)
        .bind(&task.assigner_id)
        .bind(format_timestamp(&now()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(task_id = %task.task_id, tenant_id = %task.tenant_id, "registered task conversation");
        Ok(task)
    }
}
