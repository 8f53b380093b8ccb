//! Pending Records
//!
//! A [`PendingRecord`] is one unit of outbound work that could not reach the
//! network when it was created. Records are keyed by a caller-chosen
//! idempotency key and are never deleted: a successful sync flips `synced`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Caller-chosen idempotency key
    pub key: String,
    /// Opaque body delivered to the sync endpoint
    pub payload: serde_json::Value,
    /// Set on every insertion or overwrite
    pub created_at: DateTime<Utc>,
    /// False until delivered
    pub synced: bool,
}

impl PendingRecord {
    /// Fresh unsynced record stamped with the current time
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
            created_at: Utc::now(),
            synced: false,
        }
    }
}
