use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use crate::shared::error::TransportError;
use std::path::PathBuf;
use url::Url;

/// Client configuration wrapper.
///
/// Resolves the URLs every client component talks to from one [`AppConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        let app = AppConfig::builder()
            .env()
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("ignoring invalid environment configuration: {}", e);
                AppConfig::default()
            });
        Self { app }
    }
}

impl Config {
    /// Create a new configuration from defaults and the environment
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self { app })
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        Ok(Self { app })
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.trim_end_matches('/')
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    /// Full URL of the sync delivery endpoint
    pub fn sync_url(&self) -> String {
        self.api_url(&self.app.sync_endpoint)
    }

    /// WebSocket base: the override if configured, else the server origin
    /// with `ws`/`wss` matching `http`/`https`
    pub fn ws_base(&self) -> Result<Url, TransportError> {
        if let Some(ws) = &self.app.ws_url {
            return Url::parse(ws).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", ws, e)));
        }

        let mut url = Url::parse(&self.app.server_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.app.server_url, e)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::InvalidUrl(format!("cannot use {} as ws base", url)))?;
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Channel URL for one task: `<ws-base>/api/v1/ws/tasks/<task_id>`
    pub fn task_ws_url(&self, task_id: &str) -> Result<Url, TransportError> {
        if task_id.is_empty() {
            return Err(TransportError::InvalidUrl("empty task id".to_string()));
        }
        let mut url = self.ws_base()?;
        let base = url.to_string();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(["api", "v1", "ws", "tasks", task_id]);
        Ok(url)
    }

    /// Queue database file; defaults to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.app.database_path {
            return path.clone();
        }
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("procurement");
        path.push("offline.db");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn config(builder: AppConfigBuilder) -> Config {
        Config::with_builder(builder).unwrap()
    }

    #[test]
    fn test_api_url() {
        let config = config(AppConfig::builder());
        let url = config.api_url("/api/auth/login");
        assert_eq!(url, "http://127.0.0.1:3000/api/auth/login");
    }

    #[test]
    fn test_sync_url() {
        let config = config(AppConfig::builder().server_url("https://shop.example.com/"));
        assert_eq!(config.sync_url(), "https://shop.example.com/api/brain/sync");
    }

    #[test]
    fn test_ws_url_follows_scheme() {
        let plain = config(AppConfig::builder().server_url("http://shop.example.com:8080"));
        assert_eq!(
            plain.task_ws_url("42").unwrap().as_str(),
            "ws://shop.example.com:8080/api/v1/ws/tasks/42"
        );

        let secure = config(AppConfig::builder().server_url("https://shop.example.com"));
        assert_eq!(
            secure.task_ws_url("42").unwrap().as_str(),
            "wss://shop.example.com/api/v1/ws/tasks/42"
        );
    }

    #[test]
    fn test_ws_override_keeps_path() {
        let config = config(AppConfig::builder().ws_url("wss://rt.example.com/brain"));
        assert_eq!(
            config.task_ws_url("abc").unwrap().as_str(),
            "wss://rt.example.com/brain/api/v1/ws/tasks/abc"
        );
    }

    #[test]
    fn test_task_id_is_escaped() {
        let config = config(AppConfig::builder());
        let url = config.task_ws_url("a b/c").unwrap();
        assert_eq!(url.path(), "/api/v1/ws/tasks/a%20b%2Fc");
    }

    #[test]
    fn test_empty_task_id_rejected() {
        let config = config(AppConfig::builder());
        assert_matches!(
            config.task_ws_url(""),
            Err(TransportError::InvalidUrl(_))
        );
    }

    #[test]
    fn test_explicit_database_path() {
        let config = config(AppConfig::builder().database_path("/tmp/queue.db"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/queue.db"));
    }
}
