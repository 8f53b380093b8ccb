//! # Offline Sync
//!
//! Drains the queue store into the network when connectivity allows.
//!
//! ## Architecture
//!
//! - **Coordinator**: [`SyncCoordinator::sync_now`] runs one sync pass
//! - **Network Monitor**: connectivity snapshot and transition events
//! - **Delivery**: the network boundary a record is sent through
//! - **Background**: runs passes on reconnect and on tagged sync events
//! - **Metrics**: running totals across passes
//!
//! ## Sync pass
//!
//! 1. Offline: return 0 without touching the network
//! 2. Snapshot `list_pending()`; records added during the pass wait for the next one
//! 3. Deliver the snapshot sequentially; a failed record stays pending and the
//!    pass moves on
//! 4. Return how many records this pass marked synced
//!
//! Passes may overlap (a manual `sync_now` racing a background one). Both may
//! deliver the same record; the second `mark_synced` is a no-op, and the
//! `Idempotency-Key` header lets the server drop the duplicate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::offline::MemoryQueueStore;
//! use procurement_offline::client::sync::{ConnectivityMonitor, HttpDelivery, SyncCoordinator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), procurement_offline::shared::StorageError> {
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(MemoryQueueStore::new()),
//!     ConnectivityMonitor::new(true),
//!     Arc::new(HttpDelivery::new("http://127.0.0.1:3000/api/brain/sync")),
//! );
//! let synced = coordinator.sync_now().await?;
//! println!("synced {} records", synced);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod delivery;
pub mod metrics;
pub mod network_monitor;

pub use background::BackgroundSync;
pub use delivery::{Delivery, HttpDelivery};
pub use metrics::SyncMetrics;
pub use network_monitor::{
    ConnectivityMonitor, HttpProbe, NetworkEvent, ReachabilityProbe, Subscription,
};

use crate::client::offline::queue::QueueStore;
use crate::shared::error::StorageError;
use crate::shared::record::PendingRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Failures kept in [`SyncStatus::errors`]
const MAX_RECENT_ERRORS: usize = 20;

/// Observable synchronization state
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Passes currently running
    pub active_passes: usize,
    /// End of the last pass that reached the network
    pub last_sync: Option<DateTime<Utc>>,
    /// Records marked synced by the last pass
    pub last_synced: usize,
    /// Unsynced records as of the last refresh
    pub pending_records: usize,
    /// Most recent delivery failures, newest last
    pub errors: Vec<String>,
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        self.active_passes > 0
    }
}

/// Main sync coordinator
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn QueueStore>,
    monitor: Arc<ConnectivityMonitor>,
    delivery: Arc<dyn Delivery>,
    status: Arc<RwLock<SyncStatus>>,
    metrics: Arc<RwLock<SyncMetrics>>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

struct PassOutcome {
    synced: usize,
    failures: Vec<String>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn QueueStore>,
        monitor: Arc<ConnectivityMonitor>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            store,
            monitor,
            delivery,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            metrics: Arc::new(RwLock::new(SyncMetrics::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Run one sync pass and return how many records it marked synced
    pub async fn sync_now(&self) -> Result<usize, StorageError> {
        if !self.monitor.is_online() {
            tracing::debug!("skipping sync pass while offline");
            self.metrics.write().await.record_skipped();
            return Ok(0);
        }

        let snapshot = self.store.list_pending().await?;
        if snapshot.is_empty() {
            self.set_pending(0).await;
            return Ok(0);
        }

        tracing::info!(records = snapshot.len(), "starting sync pass");
        self.status.write().await.active_passes += 1;
        self.metrics.write().await.record_pass_start();
        let started = Instant::now();

        let result = self.drain(snapshot).await;
        self.finish_pass(&result, started.elapsed()).await;

        let outcome = result?;
        tracing::info!(
            synced = outcome.synced,
            failed = outcome.failures.len(),
            "sync pass finished"
        );
        Ok(outcome.synced)
    }

    /// Deliver every record of the snapshot, in order, one at a time
    async fn drain(&self, snapshot: Vec<PendingRecord>) -> Result<PassOutcome, StorageError> {
        let mut outcome = PassOutcome {
            synced: 0,
            failures: Vec::new(),
        };

        for record in snapshot {
            match self.delivery.deliver(&record).await {
                Ok(()) => {
                    self.store.mark_synced(&record.key).await?;
                    outcome.synced += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %record.key, "sync failed: {}", e);
                    outcome.failures.push(format!("{}: {}", record.key, e));
                }
            }
        }

        Ok(outcome)
    }

    async fn finish_pass(&self, result: &Result<PassOutcome, StorageError>, elapsed: Duration) {
        let pending = match self.store.count_pending().await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::error!("cannot count pending records: {}", e);
                None
            }
        };

        {
            let mut metrics = self.metrics.write().await;
            match result {
                Ok(outcome) => {
                    metrics.record_pass_end(outcome.synced, outcome.failures.len(), elapsed)
                }
                Err(_) => metrics.record_pass_end(0, 0, elapsed),
            }
        }

        let mut status = self.status.write().await;
        status.active_passes = status.active_passes.saturating_sub(1);
        if let Some(pending) = pending {
            status.pending_records = pending;
        }
        match result {
            Ok(outcome) => {
                status.last_sync = Some(Utc::now());
                status.last_synced = outcome.synced;
                status.errors.extend(outcome.failures.iter().cloned());
            }
            Err(e) => {
                tracing::error!("sync pass aborted: {}", e);
                status.errors.push(format!("storage: {}", e));
            }
        }
        let excess = status.errors.len().saturating_sub(MAX_RECENT_ERRORS);
        status.errors.drain(..excess);
    }

    async fn set_pending(&self, pending: usize) {
        self.status.write().await.pending_records = pending;
    }

    /// Recompute the pending count from the store
    pub async fn refresh_pending_count(&self) -> Result<usize, StorageError> {
        let pending = self.store.count_pending().await?;
        self.set_pending(pending).await;
        Ok(pending)
    }

    /// Get current sync status
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }
}
