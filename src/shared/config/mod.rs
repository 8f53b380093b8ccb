//! Application configuration module
//!
//! Provides the validated configuration shared by every component of the
//! offline subsystem. Values come from three layers, lowest precedence first:
//! built-in defaults, an optional TOML file, and environment variables.
//!
//! ```toml
//! server_url = "https://shop.example.com"
//! reconnect_interval_ms = 5000
//! auto_reconnect = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
/// Endpoint receiving queued records
pub const DEFAULT_SYNC_ENDPOINT: &str = "/api/brain/sync";
/// Path prefix of API requests (network-first)
pub const DEFAULT_API_PREFIX: &str = "/api/";
/// Delay before a dropped task channel reconnects
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);
/// Upper bound on a task channel handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Cache generation tag of the current interceptor version
pub const DEFAULT_CACHE_VERSION: &str = "procurement-v1";
/// Background sync registration tag
pub const DEFAULT_SYNC_TAG: &str = "sync-orders";
/// How often the pending count is recomputed
pub const DEFAULT_PENDING_REFRESH: Duration = Duration::from_secs(10);
/// How often the reachability probe polls the server
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server URL (http or https)
    pub server_url: String,
    /// WebSocket base override (ws or wss); derived from `server_url` when unset
    pub ws_url: Option<String>,
    /// Path of the sync delivery endpoint
    pub sync_endpoint: String,
    /// Path prefix identifying API requests
    pub api_prefix: String,
    /// Whether task channels reconnect after an unexpected close
    pub auto_reconnect: bool,
    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Handshake timeout for task channels
    pub handshake_timeout: Duration,
    /// SQLite file backing the queue store; platform data dir when unset
    pub database_path: Option<PathBuf>,
    /// Cache generation tag
    pub cache_version: String,
    /// Background sync tag
    pub sync_tag: String,
    /// Pending count refresh period
    pub pending_refresh: Duration,
    /// Reachability probe period
    pub probe_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            ws_url: None,
            sync_endpoint: DEFAULT_SYNC_ENDPOINT.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            auto_reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            database_path: None,
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
            pending_refresh: DEFAULT_PENDING_REFRESH,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: server URL must be http or https",
                self.server_url
            )));
        }

        if let Some(ws) = &self.ws_url {
            let parsed =
                Url::parse(ws).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", ws, e)))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::InvalidUrl(format!(
                    "{}: WebSocket base must be ws or wss",
                    ws
                )));
            }
        }

        if !self.sync_endpoint.starts_with('/') {
            return Err(ConfigError::invalid("sync_endpoint", "must start with '/'"));
        }
        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::invalid("api_prefix", "must start with '/'"));
        }
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::invalid("reconnect_interval_ms", "must be positive"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::invalid("handshake_timeout_ms", "must be positive"));
        }
        if self.cache_version.is_empty() {
            return Err(ConfigError::MissingValue("cache_version"));
        }
        if self.sync_tag.is_empty() {
            return Err(ConfigError::MissingValue("sync_tag"));
        }
        Ok(())
    }
}

/// Shape of the optional TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    ws_url: Option<String>,
    sync_endpoint: Option<String>,
    api_prefix: Option<String>,
    auto_reconnect: Option<bool>,
    reconnect_interval_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    database_path: Option<PathBuf>,
    cache_version: Option<String>,
    sync_tag: Option<String>,
    pending_refresh_ms: Option<u64>,
    probe_interval_ms: Option<u64>,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    ws_url: Option<String>,
    sync_endpoint: Option<String>,
    api_prefix: Option<String>,
    auto_reconnect: Option<bool>,
    reconnect_interval: Option<Duration>,
    handshake_timeout: Option<Duration>,
    database_path: Option<PathBuf>,
    cache_version: Option<String>,
    sync_tag: Option<String>,
    pending_refresh: Option<Duration>,
    probe_interval: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Override the WebSocket base URL
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    /// Set the sync endpoint path
    pub fn sync_endpoint(mut self, path: impl Into<String>) -> Self {
        self.sync_endpoint = Some(path.into());
        self
    }

    /// Set the API path prefix
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable task channel auto-reconnect
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    /// Set the reconnect interval
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = Some(interval);
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Set the queue database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the cache generation tag
    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = Some(version.into());
        self
    }

    /// Set the background sync tag
    pub fn sync_tag(mut self, tag: impl Into<String>) -> Self {
        self.sync_tag = Some(tag.into());
        self
    }

    /// Set the pending count refresh period
    pub fn pending_refresh(mut self, period: Duration) -> Self {
        self.pending_refresh = Some(period);
        self
    }

    /// Set the reachability probe period
    pub fn probe_interval(mut self, period: Duration) -> Self {
        self.probe_interval = Some(period);
        self
    }

    /// Layer values from a TOML document; values already set on the builder win
    pub fn toml_str(mut self, document: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(document)?;
        let ms = Duration::from_millis;
        self.server_url = self.server_url.or(file.server_url);
        self.ws_url = self.ws_url.or(file.ws_url);
        self.sync_endpoint = self.sync_endpoint.or(file.sync_endpoint);
        self.api_prefix = self.api_prefix.or(file.api_prefix);
        self.auto_reconnect = self.auto_reconnect.or(file.auto_reconnect);
        self.reconnect_interval = self.reconnect_interval.or(file.reconnect_interval_ms.map(ms));
        self.handshake_timeout = self.handshake_timeout.or(file.handshake_timeout_ms.map(ms));
        self.database_path = self.database_path.or(file.database_path);
        self.cache_version = self.cache_version.or(file.cache_version);
        self.sync_tag = self.sync_tag.or(file.sync_tag);
        self.pending_refresh = self.pending_refresh.or(file.pending_refresh_ms.map(ms));
        self.probe_interval = self.probe_interval.or(file.probe_interval_ms.map(ms));
        Ok(self)
    }

    /// Layer values from a TOML file
    pub fn toml_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path)?;
        self.toml_str(&document)
    }

    /// Apply `CLIENT_API_URL`, `CLIENT_WS_URL` and `OFFLINE_DB_PATH`; these override earlier values
    pub fn env(mut self) -> Self {
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            self.server_url = Some(url);
        }
        if let Ok(url) = std::env::var("CLIENT_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Ok(path) = std::env::var("OFFLINE_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            ws_url: self.ws_url.or(defaults.ws_url),
            sync_endpoint: self.sync_endpoint.unwrap_or(defaults.sync_endpoint),
            api_prefix: self.api_prefix.unwrap_or(defaults.api_prefix),
            auto_reconnect: self.auto_reconnect.unwrap_or(defaults.auto_reconnect),
            reconnect_interval: self.reconnect_interval.unwrap_or(defaults.reconnect_interval),
            handshake_timeout: self.handshake_timeout.unwrap_or(defaults.handshake_timeout),
            database_path: self.database_path.or(defaults.database_path),
            cache_version: self.cache_version.unwrap_or(defaults.cache_version),
            sync_tag: self.sync_tag.unwrap_or(defaults.sync_tag),
            pending_refresh: self.pending_refresh.unwrap_or(defaults.pending_refresh),
            probe_interval: self.probe_interval.unwrap_or(defaults.probe_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
