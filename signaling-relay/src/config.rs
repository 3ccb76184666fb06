//! Configuration loading for signaling-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for signaling-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Permanent key pair location.
    #[serde(default)]
    pub keys: KeysConfig,
    /// Device token storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Connection limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Room lifecycle.
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Push notifications.
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for HTTP and WebSocket (default: 0.0.0.0:8765).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// SaltyRTC sub-protocol (default: v1.saltyrtc.org).
    #[serde(default = "default_subprotocol")]
    pub subprotocol: String,
}

/// Permanent key pair file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    /// Hex-encoded public key file (default: ./public.key).
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,
    /// Hex-encoded private key file (default: ./private.key).
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Connection limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound frame size in bytes (default: 64 KiB).
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Seconds to wait for a pong after a keepalive ping (default: 10).
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
    /// Largest ping interval a client may request (default: 3600).
    #[serde(default = "default_max_ping_interval_secs")]
    pub max_ping_interval_secs: u64,
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Remove rooms from the registry when their last client leaves
    /// (default: true).
    #[serde(default = "default_reap_empty")]
    pub reap_empty: bool,
}

/// Push notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// FCM server key; notifications are disabled when absent.
    pub fcm_server_key: Option<String>,
    /// FCM send endpoint.
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    /// Notification title.
    #[serde(default = "default_notification_title")]
    pub title: String,
    /// Notification body.
    #[serde(default = "default_notification_message")]
    pub message: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8765".to_string()
}

fn default_subprotocol() -> String {
    "v1.saltyrtc.org".to_string()
}

fn default_public_key_path() -> PathBuf {
    PathBuf::from("./public.key")
}

fn default_private_key_path() -> PathBuf {
    PathBuf::from("./private.key")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("devices.db")
}

fn default_max_frame_size() -> usize {
    64 * 1024 // 64 KiB
}

fn default_pong_wait_secs() -> u64 {
    10
}

fn default_max_ping_interval_secs() -> u64 {
    3600 // 1 hour
}

fn default_reap_empty() -> bool {
    true
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

fn default_notification_title() -> String {
    "Incoming connection".to_string()
}

fn default_notification_message() -> String {
    "A peer wants to connect to this device".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            subprotocol: default_subprotocol(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            public_key_path: default_public_key_path(),
            private_key_path: default_private_key_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            pong_wait_secs: default_pong_wait_secs(),
            max_ping_interval_secs: default_max_ping_interval_secs(),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            reap_empty: default_reap_empty(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            fcm_server_key: None,
            endpoint: default_fcm_endpoint(),
            title: default_notification_title(),
            message: default_notification_message(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LimitsConfig {
    /// How long a keepalive ping may go unanswered.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
