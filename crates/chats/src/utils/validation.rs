//! Validation utilities.

use crate::entities::CreateRoomRequest;
use crate::types::ChatError;

/// Longest accepted message body, in characters
pub const MAX_BODY_CHARS: usize = 10_000;
/// Longest accepted room name, in characters
pub const MAX_ROOM_NAME_CHARS: usize = 120;
/// Longest accepted identifier
pub const MAX_ID_LEN: usize = 128;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate message body
    pub fn message_body(body: &str) -> Result<(), ChatError> {
        if body.trim().is_empty() {
            return Err(ChatError::validation("Message body cannot be empty"));
        }

        if body.chars().count() > MAX_BODY_CHARS {
            return Err(ChatError::validation(format!(
                "Message body too long (max {} characters)",
                MAX_BODY_CHARS
            )));
        }

        Ok(())
    }

    /// Validate room name
    pub fn room_name(name: &str) -> Result<(), ChatError> {
        if name.trim().is_empty() {
            return Err(ChatError::validation("Room name cannot be empty"));
        }

        if name.chars().count() > MAX_ROOM_NAME_CHARS {
            return Err(ChatError::validation(format!(
                "Room name too long (max {} characters)",
                MAX_ROOM_NAME_CHARS
            )));
        }

        Ok(())
    }

    /// Validate an identifier such as a room, task, or user id
    pub fn identifier(field: &str, value: &str) -> Result<(), ChatError> {
        if value.trim().is_empty() {
            return Err(ChatError::validation(format!("{} cannot be empty", field)));
        }

        if value.len() > MAX_ID_LEN {
            return Err(ChatError::validation(format!(
                "{} too long (max {} characters)",
                field, MAX_ID_LEN
            )));
        }

        if value.chars().any(char::is_whitespace) {
            return Err(ChatError::validation(format!(
                "{} cannot contain whitespace",
                field
            )));
        }

        Ok(())
    }

    /// Validate a room creation request
    pub fn create_room(request: &CreateRoomRequest) -> Result<(), ChatError> {
        Self::room_name(&request.name)?;
        for member in &request.member_ids {
            Self::identifier("Member id", member)?;
        }
        Ok(())
    }
}
