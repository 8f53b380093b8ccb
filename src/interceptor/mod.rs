//! # Request Interception
//!
//! A versioned caching layer in front of the network, modelled on a web
//! service worker.
//!
//! ## Lifecycle
//!
//! 1. **Install**: precache the app shell into this version's generation,
//!    then skip waiting, which activates immediately
//! 2. **Activate**: delete every other generation, then take control of
//!    open clients
//! 3. **Fetch**: serve requests by [`Strategy`] once active
//!
//! A version built with [`RequestInterceptor::wait_for_clients`] stays
//! installed and waiting after install until the host calls `activate` or a
//! `{"type": "SKIP_WAITING"}` message arrives. Tagged sync events are
//! forwarded to [`BackgroundSync`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::interceptor::{
//!     InterceptedRequest, MemoryResponseCache, ReqwestNetwork, RequestInterceptor,
//! };
//! use std::sync::Arc;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let interceptor = RequestInterceptor::new(
//!     Url::parse("http://127.0.0.1:3000")?,
//!     "procurement-v1",
//!     Arc::new(MemoryResponseCache::new()),
//!     Arc::new(ReqwestNetwork::default()),
//! );
//! interceptor.install().await?;
//!
//! let served = interceptor
//!     .handle_fetch(&InterceptedRequest::get(Url::parse("http://127.0.0.1:3000/app.js")?))
//!     .await?;
//! println!("{} bytes from {:?}", served.response.body.len(), served.source);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod network;
pub mod request;
pub mod strategy;

pub use cache::{MemoryResponseCache, ResponseCache};
pub use network::{Network, ReqwestNetwork};
pub use request::{CacheKey, CachedResponse, InterceptedRequest, RequestMode};
pub use strategy::{classify, Strategy};

use crate::client::config::Config;
use crate::client::sync::BackgroundSync;
use crate::shared::config::{ConfigError, DEFAULT_API_PREFIX};
use crate::shared::error::{FetchError, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// App shell fetched at install time
pub const PRECACHE_PATHS: &[&str] = &["/", "/index.html", "/manifest.json"];

/// Control message posted to the interceptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, nothing cached yet
    Parsed,
    /// App shell cached, waiting to activate
    Installed,
    /// Serving requests for all clients
    Activated,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The cached site root, served for a failed navigation
    RootFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
}

impl Served {
    fn network(response: CachedResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    fn cache(response: CachedResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Cache,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
    controls_clients: bool,
}

/// Versioned request interceptor
pub struct RequestInterceptor {
    origin: Url,
    generation: String,
    api_prefix: String,
    cache: Arc<dyn ResponseCache>,
    network: Arc<dyn Network>,
    background: Option<Arc<BackgroundSync>>,
    lifecycle: RwLock<Lifecycle>,
}

impl std::fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("origin", &self.origin.as_str())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl RequestInterceptor {
    pub fn new(
        origin: Url,
        generation: impl Into<String>,
        cache: Arc<dyn ResponseCache>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            origin,
            generation: generation.into(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cache,
            network,
            background: None,
            lifecycle: RwLock::new(Lifecycle {
                state: WorkerState::Parsed,
                skip_waiting: true,
                controls_clients: false,
            }),
        }
    }

    /// Interceptor for the configured server, cache version and API prefix
    pub fn from_config(
        config: &Config,
        cache: Arc<dyn ResponseCache>,
        network: Arc<dyn Network>,
    ) -> Result<Self, ConfigError> {
        let app = config.app();
        let origin = Url::parse(&app.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", app.server_url, e)))?;
        let mut interceptor = Self::new(origin, app.cache_version.clone(), cache, network);
        interceptor.api_prefix = app.api_prefix.clone();
        Ok(interceptor)
    }

    /// Stay waiting after install instead of activating straight away
    pub fn wait_for_clients(mut self) -> Self {
        self.lifecycle.get_mut().skip_waiting = false;
        self
    }

    pub fn with_background_sync(mut self, background: Arc<BackgroundSync>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state
    }

    pub async fn controls_clients(&self) -> bool {
        self.lifecycle.read().await.controls_clients
    }

    /// Installed and not allowed to activate yet
    pub async fn is_waiting(&self) -> bool {
        let lifecycle = self.lifecycle.read().await;
        lifecycle.state == WorkerState::Installed && !lifecycle.skip_waiting
    }

    fn root_key(&self) -> Result<CacheKey, FetchError> {
        let root = self
            .origin
            .join("/")
            .map_err(|e| FetchError::cache(e.to_string()))?;
        Ok(CacheKey::new(&reqwest::Method::GET, &root))
    }

    /// Precache the app shell, then activate unless waiting for clients
    ///
    /// All-or-nothing: if any shell resource cannot be fetched with a 2xx
    /// status, nothing is cached and the version stays uninstalled.
    pub async fn install(&self) -> Result<(), FetchError> {
        tracing::info!(generation = %self.generation, "installing");

        let mut fetched = Vec::with_capacity(PRECACHE_PATHS.len());
        for path in PRECACHE_PATHS {
            let url = self
                .origin
                .join(path)
                .map_err(|e| FetchError::cache(format!("{}: {}", path, e)))?;
            let request = InterceptedRequest::get(url);
            let response = self.network.fetch(&request).await?;
            if !response.is_ok() {
                return Err(FetchError::network(
                    request.url.as_str(),
                    format!("precache got HTTP {}", response.status),
                ));
            }
            fetched.push((request.cache_key(), response));
        }

        for (key, response) in fetched {
            self.cache.put(&self.generation, key, response).await?;
        }
        tracing::info!(generation = %self.generation, "app shell precached");

        let skip_waiting = {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.state = WorkerState::Installed;
            lifecycle.skip_waiting
        };
        if skip_waiting {
            self.activate().await?;
        } else {
            tracing::info!(generation = %self.generation, "installed, waiting to activate");
        }
        Ok(())
    }

    /// Activate without waiting for old clients to go away
    ///
    /// Activates now when installed; before install it makes the coming
    /// install activate straight away.
    pub async fn skip_waiting(&self) -> Result<(), FetchError> {
        let installed = {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.skip_waiting = true;
            lifecycle.state == WorkerState::Installed
        };
        if installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// Purge other generations, then take control of all clients
    pub async fn activate(&self) -> Result<(), FetchError> {
        tracing::info!(generation = %self.generation, "activating");
        for name in self.cache.generations().await? {
            if name != self.generation {
                tracing::info!(generation = %name, "deleting old cache generation");
                self.cache.delete_generation(&name).await?;
            }
        }

        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.state = WorkerState::Activated;
        lifecycle.controls_clients = true;
        Ok(())
    }

    /// Handle a posted control message; returns whether it was understood
    pub async fn handle_message(&self, message: &serde_json::Value) -> Result<bool, FetchError> {
        let message = match ControlMessage::deserialize(message) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("ignoring control message: {}", e);
                return Ok(false);
            }
        };

        match message {
            ControlMessage::SkipWaiting => self.skip_waiting().await?,
        }
        Ok(true)
    }

    /// Handle a background sync event
    ///
    /// `None` when no background sync is attached or the tag is not ours.
    pub async fn handle_sync(&self, tag: &str) -> Option<Result<usize, StorageError>> {
        tracing::info!(tag, "sync event");
        match &self.background {
            Some(background) => background.fire(tag).await,
            None => None,
        }
    }

    /// Serve one request
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<Served, FetchError> {
        if !self.controls_clients().await {
            return self.network.fetch(request).await.map(Served::network);
        }

        match classify(request, &self.api_prefix) {
            Strategy::PassThrough => self.network.fetch(request).await.map(Served::network),
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> Result<Served, FetchError> {
        let key = request.cache_key();
        if let Some(cached) = self.lookup(&key).await {
            return Ok(Served::cache(cached));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(key, &response).await;
                }
                Ok(Served::network(response))
            }
            Err(e) => {
                tracing::warn!(url = %request.url, "cache first: {}", e);
                self.navigation_fallback(request, e).await
            }
        }
    }

    async fn network_first(&self, request: &InterceptedRequest) -> Result<Served, FetchError> {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && request.method == reqwest::Method::GET {
                    self.store(request.cache_key(), &response).await;
                }
                Ok(Served::network(response))
            }
            Err(e) => {
                tracing::info!(url = %request.url, "network failed, trying cache");
                if let Some(cached) = self.lookup(&request.cache_key()).await {
                    return Ok(Served::cache(cached));
                }
                self.navigation_fallback(request, e).await
            }
        }
    }

    async fn navigation_fallback(
        &self,
        request: &InterceptedRequest,
        error: FetchError,
    ) -> Result<Served, FetchError> {
        if request.is_navigation() {
            if let Some(root) = self.lookup(&self.root_key()?).await {
                return Ok(Served {
                    response: root,
                    source: ResponseSource::RootFallback,
                });
            }
        }
        Err(error)
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        match self.cache.get(&self.generation, key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, "cache read failed: {}", e);
                None
            }
        }
    }

    async fn store(&self, key: CacheKey, response: &CachedResponse) {
        if let Err(e) = self.cache.put(&self.generation, key, response.clone()).await {
            tracing::warn!("cache write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves fixed bodies by path; fails every request while `down`
    #[derive(Default)]
    struct FakeNetwork {
        routes: Mutex<HashMap<String, CachedResponse>>,
        down: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn route(&self, path: &str, status: u16, body: &str) {
            self.routes
                .lock()
                .unwrap()
                .insert(path.to_string(), CachedResponse::new(status, body.to_string()));
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(FetchError::network(request.url.as_str(), "offline"));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(request.url.path())
                .cloned()
                .unwrap_or_else(|| CachedResponse::new(404, "not found")))
        }
    }

    fn url(path: &str) -> Url {
        Url::parse("http://app.local").unwrap().join(path).unwrap()
    }

    fn shell_network() -> Arc<FakeNetwork> {
        let network = Arc::new(FakeNetwork::default());
        network.route("/", 200, "<html>root</html>");
        network.route("/index.html", 200, "<html>index</html>");
        network.route("/manifest.json", 200, "{}");
        network
    }

    async fn active(
        network: Arc<FakeNetwork>,
        cache: Arc<MemoryResponseCache>,
    ) -> RequestInterceptor {
        let interceptor = RequestInterceptor::new(url("/"), "procurement-v1", cache, network);
        interceptor.install().await.unwrap();
        interceptor
    }

    #[tokio::test]
    async fn test_install_precaches_shell() {
        let cache = Arc::new(MemoryResponseCache::new());
        let interceptor =
            RequestInterceptor::new(url("/"), "procurement-v1", cache.clone(), shell_network());

        assert_eq!(interceptor.state().await, WorkerState::Parsed);
        interceptor.install().await.unwrap();
        assert_eq!(interceptor.state().await, WorkerState::Activated);
        assert!(!interceptor.is_waiting().await);
        assert_eq!(cache.len("procurement-v1").await, 3);
        assert!(interceptor.controls_clients().await);
    }

    #[tokio::test]
    async fn test_waiting_version_stays_installed() {
        let cache = Arc::new(MemoryResponseCache::new());
        let stale = CacheKey::new(&reqwest::Method::GET, &url("/app.js"));
        cache
            .put("procurement-v0", stale, CachedResponse::new(200, "old"))
            .await
            .unwrap();
        let interceptor =
            RequestInterceptor::new(url("/"), "procurement-v1", cache.clone(), shell_network())
                .wait_for_clients();

        interceptor.install().await.unwrap();
        assert_eq!(interceptor.state().await, WorkerState::Installed);
        assert!(interceptor.is_waiting().await);
        assert!(!interceptor.controls_clients().await);
        assert_eq!(cache.generations().await.unwrap().len(), 2);

        interceptor.skip_waiting().await.unwrap();
        assert_eq!(interceptor.state().await, WorkerState::Activated);
        assert!(interceptor.controls_clients().await);
        assert_eq!(cache.generations().await.unwrap(), vec!["procurement-v1"]);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let network = Arc::new(FakeNetwork::default());
        network.route("/", 200, "root");
        let cache = Arc::new(MemoryResponseCache::new());
        let interceptor = RequestInterceptor::new(url("/"), "procurement-v1", cache.clone(), network);

        assert!(interceptor.install().await.is_err());
        assert_eq!(cache.len("procurement-v1").await, 0);
        assert_eq!(interceptor.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_purges_other_generations() {
        let cache = Arc::new(MemoryResponseCache::new());
        let stale = CacheKey::new(&reqwest::Method::GET, &url("/app.js"));
        cache
            .put("procurement-v0", stale, CachedResponse::new(200, "old"))
            .await
            .unwrap();

        let interceptor = active(shell_network(), cache.clone()).await;
        assert_eq!(cache.generations().await.unwrap(), vec!["procurement-v1"]);
        assert!(interceptor.controls_clients().await);
        assert_eq!(interceptor.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let cache = Arc::new(MemoryResponseCache::new());
        let interceptor =
            RequestInterceptor::new(url("/"), "procurement-v1", cache, shell_network())
                .wait_for_clients();
        interceptor.install().await.unwrap();
        assert!(interceptor.is_waiting().await);

        let handled = interceptor
            .handle_message(&serde_json::json!({ "type": "SKIP_WAITING" }))
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(interceptor.state().await, WorkerState::Activated);

        let handled = interceptor
            .handle_message(&serde_json::json!({ "type": "CLAIM" }))
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_not_intercepting_before_activation() {
        let network = shell_network();
        network.route("/app.js", 200, "console.log(1)");
        let cache = Arc::new(MemoryResponseCache::new());
        let interceptor = RequestInterceptor::new(url("/"), "procurement-v1", cache.clone(), network);

        let served = interceptor.handle_fetch(&InterceptedRequest::get(url("/app.js"))).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(cache.len("procurement-v1").await, 0);
    }

    #[tokio::test]
    async fn test_cache_first_serves_offline() {
        let network = shell_network();
        network.route("/assets/app.js", 200, "console.log(1)");
        let interceptor = active(network.clone(), Arc::new(MemoryResponseCache::new())).await;
        let request = InterceptedRequest::get(url("/assets/app.js"));

        let first = interceptor.handle_fetch(&request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);

        network.set_down(true);
        let calls = network.calls();
        let second = interceptor.handle_fetch(&request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, first.response.body);
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let network = shell_network();
        let interceptor = active(network.clone(), Arc::new(MemoryResponseCache::new())).await;
        let request = InterceptedRequest::get(url("/missing.css"));

        assert_eq!(interceptor.handle_fetch(&request).await.unwrap().response.status, 404);
        network.set_down(true);
        assert!(interceptor.handle_fetch(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let network = shell_network();
        network.route("/api/v1/catalog", 200, r#"{"items":[]}"#);
        let interceptor = active(network.clone(), Arc::new(MemoryResponseCache::new())).await;
        let request = InterceptedRequest::get(url("/api/v1/catalog"));

        assert_eq!(interceptor.handle_fetch(&request).await.unwrap().source, ResponseSource::Network);

        network.route("/api/v1/catalog", 200, r#"{"items":[1]}"#);
        let fresh = interceptor.handle_fetch(&request).await.unwrap();
        assert_eq!(fresh.response.body, r#"{"items":[1]}"#);

        network.set_down(true);
        let cached = interceptor.handle_fetch(&request).await.unwrap();
        assert_eq!(cached.source, ResponseSource::Cache);
        assert_eq!(cached.response.body, r#"{"items":[1]}"#);
    }

    #[tokio::test]
    async fn test_navigation_falls_back_to_root() {
        let network = shell_network();
        let interceptor = active(network.clone(), Arc::new(MemoryResponseCache::new())).await;
        network.set_down(true);

        let served = interceptor
            .handle_fetch(&InterceptedRequest::navigate(url("/dashboard")))
            .await
            .unwrap();
        assert_eq!(served.source, ResponseSource::RootFallback);
        assert_eq!(served.response.body, "<html>root</html>");

        let err = interceptor
            .handle_fetch(&InterceptedRequest::get(url("/dashboard")))
            .await
            .unwrap_err();
        assert_matches!(err, FetchError::Network { .. });
    }

    #[tokio::test]
    async fn test_non_get_is_never_cached() {
        let network = shell_network();
        network.route("/api/brain/sync", 200, "ok");
        let cache = Arc::new(MemoryResponseCache::new());
        let interceptor = active(network.clone(), cache.clone()).await;

        let request = InterceptedRequest::new(reqwest::Method::POST, url("/api/brain/sync"))
            .with_body(r#"{"sku":"A-1"}"#);
        assert_eq!(interceptor.handle_fetch(&request).await.unwrap().response.body, "ok");
        assert_eq!(cache.len("procurement-v1").await, 3);

        network.set_down(true);
        assert!(interceptor.handle_fetch(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_sync_without_background_is_ignored() {
        let interceptor = active(shell_network(), Arc::new(MemoryResponseCache::new())).await;
        assert!(interceptor.handle_sync("sync-orders").await.is_none());
    }
}
