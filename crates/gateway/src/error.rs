//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use huddle_chats::{ChatError, ErrorCode};
use serde_json::json;
use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InternalError(_) | GatewayError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Wire error code carried in the response body so clients can rebuild
    /// the domain error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            GatewayError::AuthenticationFailed(_) | GatewayError::AuthorizationFailed(_) => {
                ErrorCode::Unauthorized
            }
            GatewayError::InvalidRequest(_) => ErrorCode::Validation,
            GatewayError::NotFound(_) => ErrorCode::NotFound,
            GatewayError::InternalError(_) => ErrorCode::Internal,
            GatewayError::DatabaseError(_) => ErrorCode::Persistence,
        }
    }

    fn detail(&self) -> &str {
        match self {
            GatewayError::AuthenticationFailed(detail)
            | GatewayError::AuthorizationFailed(detail)
            | GatewayError::InvalidRequest(detail)
            | GatewayError::NotFound(detail)
            | GatewayError::InternalError(detail)
            | GatewayError::DatabaseError(detail) => detail,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "code": self.error_code().as_str(),
            "message": self.detail(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<ChatError> for GatewayError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::Unauthorized { reason } => GatewayError::AuthorizationFailed(reason),
            ChatError::NotFound { resource } => GatewayError::NotFound(resource),
            ChatError::Validation { message } => GatewayError::InvalidRequest(message),
            ChatError::Persistence { message } => GatewayError::DatabaseError(message),
            ChatError::Transport { reason } => GatewayError::InternalError(reason),
            ChatError::Internal { message } => GatewayError::InternalError(message),
        }
    }
}

impl From<huddle_database::DatabaseError> for GatewayError {
    fn from(error: huddle_database::DatabaseError) -> Self {
        GatewayError::DatabaseError(error.to_string())
    }
}
