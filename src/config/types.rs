//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use crate::db::Credentials;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
///
/// Every section is optional; an empty file yields a working default setup
/// that waits for credentials over HTTP.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP control surface.
    #[serde(default)]
    pub http: HttpConfig,
    /// Credential database.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Session and command behaviour.
    #[serde(default)]
    pub bot: BotConfig,
    /// Status channel the bot creates or reuses on connect.
    #[serde(default)]
    pub announcement: AnnouncementConfig,
    /// Fallback texts for commands invoked without arguments.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Seed record written to an empty credential store at startup.
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address (default: 127.0.0.1:3002).
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Logging configuration. The level comes from `RUST_LOG`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Session and command behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Base display name. Retries append a unique suffix.
    #[serde(default = "default_nickname")]
    pub nickname: String,
    /// Prefix that marks a chat message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Connect attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between connect attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Idle seconds before a keepalive command is sent.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// JSON file with the command definitions.
    #[serde(default = "default_commands_path")]
    pub commands_path: PathBuf,
}

impl BotConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            command_prefix: default_command_prefix(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            keepalive_secs: default_keepalive_secs(),
            commands_path: default_commands_path(),
        }
    }
}

/// Announcement (status) channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementConfig {
    /// Channel name; an existing channel with this exact name is reused.
    #[serde(default = "default_announcement_name")]
    pub name: String,
    #[serde(default = "default_announcement_topic")]
    pub topic: String,
    /// Online status text (BBCode), written when the channel is created.
    #[serde(default = "default_announcement_description")]
    pub description: String,
    /// Keep the channel after the bot leaves. Temporary channels are removed
    /// by the server once empty.
    #[serde(default)]
    pub permanent: bool,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            name: default_announcement_name(),
            topic: default_announcement_topic(),
            description: default_announcement_description(),
            permanent: false,
        }
    }
}

/// Fallback texts for mass commands.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_mass_poke_message")]
    pub mass_poke_message: String,
    #[serde(default = "default_mass_kick_reason")]
    pub mass_kick_reason: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            mass_poke_message: default_mass_poke_message(),
            mass_kick_reason: default_mass_kick_reason(),
        }
    }
}
