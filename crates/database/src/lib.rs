//! Huddle Database Crate
//!
//! SQLite persistence for the Huddle gateway: connection management,
//! migrations, and the [`SqliteChatRepository`] implementation of the chat
//! storage contract.

use sqlx::SqlitePool;
use huddle_config::DatabaseConfig;

pub mod connection;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;
pub use repos::SqliteChatRepository;
pub use types::{db_error, DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{:#}", e)))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = DatabaseConfig {
            url: format!("sqlite:{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_a_connection_error() {
        let config = DatabaseConfig {
            url: "sqlite:///proc/definitely/not/writable/huddle.db".to_string(),
            max_connections: 1,
        };

        let err = initialize_database(&config).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConnectionError(_)));
    }
}
