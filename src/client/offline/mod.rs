//! # Offline Queueing
//!
//! Application-facing entry point for work that must survive a lost
//! connection.
//!
//! ## Architecture
//!
//! - **Queue store**: [`QueueStore`] with SQLite and in-memory backends
//! - **Manager**: [`OfflineManager`] saves records and triggers sync passes
//! - **Banner**: [`ConnectivityBanner`] tracks what the user should be told
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::offline::{MemoryQueueStore, OfflineManager};
//! use procurement_offline::client::sync::{ConnectivityMonitor, HttpDelivery, SyncCoordinator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), procurement_offline::shared::StorageError> {
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(MemoryQueueStore::new()),
//!     ConnectivityMonitor::new(false),
//!     Arc::new(HttpDelivery::new("http://127.0.0.1:3000/api/brain/sync")),
//! );
//! let offline = OfflineManager::new(coordinator);
//!
//! let key = offline.enqueue(serde_json::json!({ "sku": "A-1", "qty": 3 })).await?;
//! assert_eq!(offline.pending_count().await?, 1);
//! # let _ = key;
//! # Ok(())
//! # }
//! ```

pub mod banner;
pub mod queue;

pub use banner::{BannerState, ConnectivityBanner};
pub use queue::{MemoryQueueStore, QueueStore};

use crate::client::sync::{SyncCoordinator, SyncStatus};
use crate::shared::error::StorageError;
use serde_json::Value;
use uuid::Uuid;

/// Facade over the queue store and the sync coordinator
#[derive(Debug, Clone)]
pub struct OfflineManager {
    coordinator: SyncCoordinator,
}

impl OfflineManager {
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Current connectivity snapshot
    pub fn is_online(&self) -> bool {
        self.coordinator.monitor().is_online()
    }

    /// Queue `payload` under a caller-chosen key
    pub async fn save_offline(&self, key: &str, payload: Value) -> Result<(), StorageError> {
        self.coordinator.store().put(key, payload).await?;
        tracing::debug!(key, "saved offline");
        self.coordinator.refresh_pending_count().await?;
        Ok(())
    }

    /// Queue `payload` under a fresh key and return it
    pub async fn enqueue(&self, payload: Value) -> Result<String, StorageError> {
        let key = Uuid::new_v4().to_string();
        self.save_offline(&key, payload).await?;
        Ok(key)
    }

    /// Payload stored under `key`, synced or not
    pub async fn get_offline(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .coordinator
            .store()
            .get(key)
            .await?
            .map(|record| record.payload))
    }

    pub async fn pending_count(&self) -> Result<usize, StorageError> {
        self.coordinator.refresh_pending_count().await
    }

    /// Run a sync pass now
    pub async fn sync_now(&self) -> Result<usize, StorageError> {
        self.coordinator.sync_now().await
    }

    pub async fn status(&self) -> SyncStatus {
        self.coordinator.status().await
    }
}
