//! Database migrations

use sqlx::SqlitePool;
use tracing::info;

use crate::types::DatabaseResult;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> DatabaseResult<()> {
    MIGRATOR.run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
