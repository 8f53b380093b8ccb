//! # Pending Record Operations
//!
//! [`QueueStore`] over the `pending_records` table. Each operation is a single
//! statement, so every write is atomic from the caller's point of view.

use crate::client::local_db::LocalDatabase;
use crate::client::offline::queue::{QueueStore, Result};
use crate::shared::record::PendingRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Queue statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Records ever written
    pub total: u64,
    /// Records waiting for delivery
    pub pending: u64,
    /// Records already delivered
    pub synced: u64,
}

impl LocalDatabase {
    /// Get queue statistics
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let (total, pending): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN synced = 0 THEN 1 ELSE 0 END), 0)
             FROM pending_records",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(QueueStats {
            total: total as u64,
            pending: pending as u64,
            synced: (total - pending) as u64,
        })
    }

    fn record_from_row(row: &SqliteRow) -> Result<PendingRecord> {
        let payload: String = row.try_get("payload")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(PendingRecord {
            key: row.try_get("key")?,
            payload: serde_json::from_str(&payload)?,
            created_at,
            synced: row.try_get("synced")?,
        })
    }
}

#[async_trait]
impl QueueStore for LocalDatabase {
    async fn put(&self, key: &str, payload: serde_json::Value) -> Result<()> {
        let data = serde_json::to_string(&payload)?;
        sqlx::query(
            "INSERT INTO pending_records (key, payload, created_at, synced)
             VALUES (?, ?, ?, 0)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                synced = 0",
        )
        .bind(key)
        .bind(data)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingRecord>> {
        let row = sqlx::query(
            "SELECT key, payload, created_at, synced FROM pending_records WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<PendingRecord>> {
        let rows = sqlx::query(
            "SELECT key, payload, created_at, synced FROM pending_records
             WHERE synced = 0
             ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn mark_synced(&self, key: &str) -> Result<()> {
        sqlx::query("UPDATE pending_records SET synced = 1 WHERE key = ? AND synced = 0")
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn count_pending(&self) -> Result<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_records WHERE synced = 0")
            .fetch_one(self.pool())
            .await?;
        Ok(count.0 as usize)
    }
}
