//! Shared types for the database layer.

pub mod errors;

pub use errors::{db_error, DatabaseError};

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
