use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "huddle.toml",
    "config/huddle.toml",
    "crates/config/huddle.toml",
    "../huddle.toml",
    "../config/huddle.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub typing: TypingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://huddle.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Sizing of the live channel fan-out.
///
/// ```
/// use huddle_config::ChannelConfig;
///
/// let channels = ChannelConfig::default();
/// assert_eq!(channels.capacity, 100);
/// assert_eq!(channels.outbound_buffer, 256);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Events buffered per channel before slow members start lagging.
    #[serde(default = "ChannelConfig::default_capacity")]
    pub capacity: usize,
    /// Events queued per connection before its writer applies backpressure.
    #[serde(default = "ChannelConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl ChannelConfig {
    const fn default_capacity() -> usize {
        100
    }

    const fn default_outbound_buffer() -> usize {
        256
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Minimum gap between two typing signals emitted for one conversation.
    #[serde(default = "TypingConfig::default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// How long a received typing signal keeps the indicator alive.
    #[serde(default = "TypingConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl TypingConfig {
    const fn default_cooldown_ms() -> u64 {
        2_000
    }

    const fn default_timeout_ms() -> u64 {
        3_000
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: Self::default_cooldown_ms(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use huddle_config::load;
///
/// std::env::remove_var("HUDDLE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "channels.capacity",
            clamp_to_i64(defaults.channels.capacity as u64),
        )?
        .set_default(
            "channels.outbound_buffer",
            clamp_to_i64(defaults.channels.outbound_buffer as u64),
        )?
        .set_default("typing.cooldown_ms", clamp_to_i64(defaults.typing.cooldown_ms))?
        .set_default("typing.timeout_ms", clamp_to_i64(defaults.typing.timeout_ms))?;

    let environment_overrides = config::Environment::with_prefix("HUDDLE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("HUDDLE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via HUDDLE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.channels.capacity == 0 {
        config.channels.capacity = ChannelConfig::default_capacity();
    }
    if config.channels.outbound_buffer == 0 {
        config.channels.outbound_buffer = ChannelConfig::default_outbound_buffer();
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
