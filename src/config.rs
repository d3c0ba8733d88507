//! Configuration module
//!
//! Read from a TOML file (`~/.config/cp-orchestrator/config.toml` by
//! default). Every section and field is optional; anything missing falls
//! back to its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::effects::{PublishTarget, DEFAULT_QUEUE_CAPACITY};
use crate::application::services::{ReaperConfig, DEFAULT_HEARTBEAT_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub messaging: MessagingConfig,
    pub authorization: AuthorizationConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// WebSocket endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ws_host: String,
    pub ws_port: u16,
    /// Heartbeat interval handed out in BootNotification responses (seconds)
    pub heartbeat_interval: u32,
    /// Graceful shutdown budget (seconds)
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9210,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    /// Pending writes held before new ones are dropped
    pub write_queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: "sqlite://./cp-orchestrator.db?mode=rwc".to_string(),
            write_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Where transaction-started events go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub exchange: String,
    pub routing_key: String,
    pub channel_capacity: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        let target = PublishTarget::default();
        Self {
            exchange: target.exchange,
            routing_key: target.routing_key,
            channel_capacity: crate::notifications::DEFAULT_CAPACITY,
        }
    }
}

impl MessagingConfig {
    pub fn target(&self) -> PublishTarget {
        PublishTarget {
            exchange: self.exchange.clone(),
            routing_key: self.routing_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    #[default]
    AcceptAll,
    List,
}

/// Id tag authorization policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub mode: AuthorizationMode,
    /// With `mode = "list"`: empty means every non-blocked tag is accepted
    pub allowed_id_tags: Vec<String>,
    pub blocked_id_tags: Vec<String>,
}

/// Session lifetime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Evict sessions idle this long. Unset keeps sessions forever.
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: u64,
    /// Reject BootNotification from charge points with no durable record
    pub require_registration: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            sweep_interval_secs: 60,
            require_registration: false,
        }
    }
}

impl SessionsConfig {
    /// Reaper settings, if eviction is enabled
    pub fn reaper(&self) -> Option<ReaperConfig> {
        self.idle_timeout_secs.map(|idle| ReaperConfig {
            idle_timeout: Duration::from_secs(idle),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Prometheus exporter; disabled unless `listen` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen: Option<String>,
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.heartbeat_interval == 0 {
            return Err(ConfigError::Invalid(
                "server.heartbeat_interval must be positive".into(),
            ));
        }
        if self.messaging.exchange.trim().is_empty() {
            return Err(ConfigError::Invalid("messaging.exchange must not be empty".into()));
        }
        if self.storage.write_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "storage.write_queue_capacity must be positive".into(),
            ));
        }
        if self.sessions.idle_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sessions.idle_timeout_secs must be positive when set".into(),
            ));
        }
        if self.storage.backend == StorageBackend::Sqlite && self.storage.database_url.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.database_url is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }
}

/// `~/.config/cp-orchestrator/config.toml`, or `./config.toml` when no
/// config directory is known
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("cp-orchestrator").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.ws_port, 9210);
        assert_eq!(config.server.heartbeat_interval, 300);
        assert_eq!(config.messaging.exchange, "management.system");
        assert_eq!(config.messaging.routing_key, "transaction.routing.key");
        assert_eq!(config.authorization.mode, AuthorizationMode::AcceptAll);
        assert_eq!(config.storage.write_queue_capacity, 10_000);
        assert!(config.sessions.reaper().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [storage]
            backend = "sqlite"

            [authorization]
            mode = "list"
            allowed_id_tags = ["TAG1"]

            [sessions]
            idle_timeout_secs = 900
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.authorization.mode, AuthorizationMode::List);
        assert_eq!(config.authorization.allowed_id_tags, vec!["TAG1"]);
        assert_eq!(config.server.ws_port, 9210);

        let reaper = config.sessions.reaper().unwrap();
        assert_eq!(reaper.idle_timeout, Duration::from_secs(900));
        assert_eq!(reaper.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml("[server]\nheartbeat_interval = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[storage]\nwrite_queue_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[server]\nws_port = \"nope\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_default() {
        let config = AppConfig::load(Path::new("/nonexistent/cp-orchestrator.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
