//! # Queue Store
//!
//! Durable storage of [`PendingRecord`]s, abstracted behind [`QueueStore`] so
//! the sync coordinator can run against SQLite in production and an in-memory
//! map in tests.
//!
//! ## Contract
//!
//! - **Last write wins**: `put` on an existing key replaces the payload,
//!   resets `synced` to false and restamps `created_at`
//! - **Mark, never remove**: delivered records stay in the store with
//!   `synced = true`
//! - **Idempotent marking**: `mark_synced` on a missing or already-synced key
//!   is a no-op
//! - **Errors propagate**: engine failures surface as [`StorageError`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::offline::queue::{MemoryQueueStore, QueueStore};
//!
//! # async fn example() -> Result<(), procurement_offline::shared::StorageError> {
//! let store = MemoryQueueStore::new();
//! store.put("order-17", serde_json::json!({ "sku": "A-1", "qty": 3 })).await?;
//! for record in store.list_pending().await? {
//!     // deliver...
//!     store.mark_synced(&record.key).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::shared::error::StorageError;
use crate::shared::record::PendingRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Result type for queue store operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable key-value store of pending outbound records
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert or overwrite the record for `key`
    async fn put(&self, key: &str, payload: serde_json::Value) -> Result<()>;

    /// Point lookup
    async fn get(&self, key: &str) -> Result<Option<PendingRecord>>;

    /// All records not yet synced, in no particular order
    async fn list_pending(&self) -> Result<Vec<PendingRecord>>;

    /// Flag a record as delivered
    async fn mark_synced(&self, key: &str) -> Result<()>;

    /// Number of records not yet synced
    async fn count_pending(&self) -> Result<usize> {
        Ok(self.list_pending().await?.len())
    }
}

/// Process-local queue store
///
/// Loses its contents on exit; used for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    records: RwLock<HashMap<String, PendingRecord>>,
}

impl MemoryQueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records, synced or not
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn put(&self, key: &str, payload: serde_json::Value) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(key.to_string(), PendingRecord::new(key, payload));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingRecord>> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<PendingRecord>> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| !r.synced).cloned().collect())
    }

    async fn mark_synced(&self, key: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(key) {
            record.synced = true;
        }
        Ok(())
    }

    async fn count_pending(&self) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| !r.synced).count())
    }
}
