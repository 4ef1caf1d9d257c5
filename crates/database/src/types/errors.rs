//! Error types for the database layer

use huddle_chats::ChatError;
use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::Duplicate(db.message().to_string())
            }
            other => DatabaseError::QueryError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationError(err.to_string())
    }
}

impl From<DatabaseError> for ChatError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(resource) => ChatError::NotFound { resource },
            DatabaseError::Duplicate(message) => ChatError::validation(message),
            other => ChatError::persistence(other.to_string()),
        }
    }
}

/// Map a driver error straight into the domain error.
pub fn db_error(err: sqlx::Error) -> ChatError {
    DatabaseError::from(err).into()
}
