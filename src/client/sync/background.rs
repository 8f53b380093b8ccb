//! # Background Sync
//!
//! Runs sync passes without the application asking for them.
//!
//! ## Triggers
//!
//! - **Reconnect**: every offline → online transition of the monitor
//! - **Tagged event**: the platform firing the registration tag
//!   (`"sync-orders"` by default), see [`BackgroundSync::fire`]
//! - **Refresh**: the pending count is recomputed on a fixed period
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::sync::{BackgroundSync, SyncCoordinator};
//! use std::time::Duration;
//!
//! # fn example(coordinator: SyncCoordinator) {
//! let mut background = BackgroundSync::new("sync-orders", coordinator, Duration::from_secs(10));
//! background.start();
//! // ...
//! background.stop();
//! # }
//! ```

use crate::client::sync::SyncCoordinator;
use crate::shared::error::StorageError;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background synchronization registration
#[derive(Debug)]
pub struct BackgroundSync {
    tag: String,
    coordinator: SyncCoordinator,
    refresh: Duration,
    workers: Vec<JoinHandle<()>>,
}

impl BackgroundSync {
    pub fn new(tag: impl Into<String>, coordinator: SyncCoordinator, refresh: Duration) -> Self {
        Self {
            tag: tag.into(),
            coordinator,
            refresh,
            workers: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Start the reconnect watcher and the pending-count refresher
    ///
    /// Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            tracing::warn!(tag = %self.tag, "background sync is already running");
            return false;
        }

        // Subscribe before spawning so a transition right after start is seen
        let online = self.coordinator.monitor().watch();
        let coordinator = self.coordinator.clone();
        let tag = self.tag.clone();
        self.workers.push(tokio::spawn(async move {
            Self::reconnect_loop(tag, coordinator, online).await;
        }));

        let coordinator = self.coordinator.clone();
        let refresh = self.refresh;
        self.workers.push(tokio::spawn(async move {
            Self::refresh_loop(coordinator, refresh).await;
        }));

        tracing::info!(tag = %self.tag, "background sync registered");
        true
    }

    /// Stop all background work
    pub fn stop(&mut self) {
        for handle in self.workers.drain(..) {
            handle.abort();
        }
    }

    /// Handle a platform sync event
    ///
    /// Runs a pass when `tag` matches the registration, otherwise returns
    /// `None` without doing anything.
    pub async fn fire(&self, tag: &str) -> Option<Result<usize, StorageError>> {
        if tag != self.tag {
            tracing::debug!(tag, registered = %self.tag, "ignoring sync event");
            return None;
        }
        tracing::info!(tag, "sync event");
        Some(self.coordinator.sync_now().await)
    }

    async fn reconnect_loop(
        tag: String,
        coordinator: SyncCoordinator,
        mut online: watch::Receiver<bool>,
    ) {
        while online.changed().await.is_ok() {
            if !*online.borrow_and_update() {
                continue;
            }
            match coordinator.sync_now().await {
                Ok(synced) => tracing::info!(tag = %tag, synced, "synced after reconnect"),
                Err(e) => tracing::error!(tag = %tag, "sync after reconnect failed: {}", e),
            }
        }
    }

    async fn refresh_loop(coordinator: SyncCoordinator, refresh: Duration) {
        let mut ticker = tokio::time::interval(refresh);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = coordinator.refresh_pending_count().await {
                tracing::warn!("cannot refresh pending count: {}", e);
            }
        }
    }
}

impl Drop for BackgroundSync {
    fn drop(&mut self) {
        self.stop();
    }
}
