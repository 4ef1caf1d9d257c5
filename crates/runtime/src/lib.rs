use std::sync::Arc;

use anyhow::{Context, Result};
use huddle_config::AppConfig;
use huddle_database::{initialize_database, SqliteChatRepository};
use huddle_gateway::GatewayState;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the gateway process needs, built once from configuration
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub gateway: GatewayState,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let repository = Arc::new(SqliteChatRepository::new(db_pool.clone()));
        let gateway = GatewayState::new(repository, config.channels.clone());

        info!(
            channel_capacity = config.channels.capacity,
            outbound_buffer = config.channels.outbound_buffer,
            "gateway state ready"
        );

        Ok(Self { db_pool, gateway })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
