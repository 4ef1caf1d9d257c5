//! Error types for the chat system.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Error code carried on the wire in `error` frames and failed acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Validation,
    Persistence,
    Transport,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Validation => "validation",
            ErrorCode::Persistence => "persistence",
            ErrorCode::Transport => "transport",
            ErrorCode::Internal => "internal",
        }
    }
}

/// Main error type for the chat system
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Access denied: {reason}")]
    Unauthorized { reason: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatError {
    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create an access denied error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a not found error for an entity of the given kind
    pub fn not_found(entity: &str, id: impl AsRef<str>) -> Self {
        Self::NotFound {
            resource: format!("{} {}", entity, id.as_ref()),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::Transport { .. } => ErrorCode::Transport,
            ChatError::Unauthorized { .. } => ErrorCode::Unauthorized,
            ChatError::NotFound { .. } => ErrorCode::NotFound,
            ChatError::Validation { .. } => ErrorCode::Validation,
            ChatError::Persistence { .. } => ErrorCode::Persistence,
            ChatError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Detail text without the variant prefix, as sent in wire frames.
    pub fn detail(&self) -> &str {
        match self {
            ChatError::Transport { reason } | ChatError::Unauthorized { reason } => reason,
            ChatError::NotFound { resource } => resource,
            ChatError::Validation { message }
            | ChatError::Persistence { message }
            | ChatError::Internal { message } => message,
        }
    }

    /// Rebuild an error received from the other side of the wire.
    pub fn from_wire(code: ErrorCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match code {
            ErrorCode::Unauthorized => Self::Unauthorized { reason: detail },
            ErrorCode::NotFound => Self::NotFound { resource: detail },
            ErrorCode::Validation => Self::Validation { message: detail },
            ErrorCode::Persistence => Self::Persistence { message: detail },
            ErrorCode::Transport => Self::Transport { reason: detail },
            ErrorCode::Internal => Self::Internal { message: detail },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::NotFound { .. })
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation {
            message: format!("malformed frame: {}", err),
        }
    }
}

impl From<chrono::ParseError> for ChatError {
    fn from(err: chrono::ParseError) -> Self {
        Self::Validation {
            message: format!("Date parsing error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_keeps_variant_and_detail() {
        let original = ChatError::not_found("room", "r1");
        let rebuilt = ChatError::from_wire(original.code(), original.detail());
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.to_string(), "Not found: room r1");
    }

    #[test]
    fn error_codes_serialize_snake_case() {
        let json = serde_json::to_string(&ErrorCode::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        assert_eq!(ErrorCode::Unauthorized.as_str(), "unauthorized");
    }

    #[test]
    fn malformed_json_maps_to_validation() {
        let err: ChatError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::Validation);
    }
}
