//! Shared application state for the gateway

use std::sync::Arc;

use huddle_chats::{ChatRepository, InMemoryChatRepository};
use huddle_config::{ChannelConfig, DatabaseConfig};
use huddle_database::SqliteChatRepository;

use crate::error::GatewayResult;
use crate::hub::ChannelHub;
use crate::rooms::RoomLifecycle;

/// Shared application state containing all services
#[derive(Clone)]
pub struct GatewayState {
    /// Storage for conversations, rooms, and messages
    repository: Arc<dyn ChatRepository>,
    /// Live channel fan-out
    hub: Arc<ChannelHub>,
    /// Room lifecycle manager
    rooms: RoomLifecycle,
    /// Channel sizing
    channels: ChannelConfig,
}

impl GatewayState {
    /// Create a new gateway state over any storage implementation
    pub fn new(repository: Arc<dyn ChatRepository>, channels: ChannelConfig) -> Self {
        let hub = Arc::new(ChannelHub::new(channels.capacity));
        let rooms = RoomLifecycle::new(repository.clone(), hub.clone());
        Self {
            repository,
            hub,
            rooms,
            channels,
        }
    }

    /// Create gateway state backed by SQLite
    pub async fn from_config(
        database: &DatabaseConfig,
        channels: ChannelConfig,
    ) -> GatewayResult<Self> {
        let pool = huddle_database::initialize_database(database).await?;
        let repository = Arc::new(SqliteChatRepository::new(pool));
        Ok(Self::new(repository, channels))
    }

    /// Gateway state backed by the in-memory repository
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryChatRepository::default()),
            ChannelConfig::default(),
        )
    }

    pub fn repository(&self) -> &Arc<dyn ChatRepository> {
        &self.repository
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    pub fn rooms(&self) -> &RoomLifecycle {
        &self.rooms
    }

    pub fn channels(&self) -> &ChannelConfig {
        &self.channels
    }
}
