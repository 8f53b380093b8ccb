//! # Local Database Module
//!
//! SQLite storage for the offline queue. Records written here survive process
//! restarts, which is what lets an order captured offline be delivered after
//! the application is reopened.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool, pragmas, and schema migrations
//! - `schema.rs`: schema versions and migration statements
//! - `pending.rs`: the [`QueueStore`](crate::client::offline::QueueStore)
//!   implementation over the `pending_records` table
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::local_db::LocalDatabase;
//! use procurement_offline::client::offline::QueueStore;
//!
//! # async fn example() -> Result<(), procurement_offline::shared::StorageError> {
//! let db = LocalDatabase::open("/var/lib/procurement/offline.db").await?;
//! db.put("order-17", serde_json::json!({ "sku": "A-1" })).await?;
//! let pending = db.list_pending().await?;
//! # Ok(())
//! # }
//! ```

pub mod pending;
pub mod schema;

use crate::shared::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Local database connection manager
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Creates parent directories as needed. Uses WAL mode so readers do not
    /// block the sync coordinator's writes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        tracing::info!(path = %path.display(), "opened offline queue database");
        Ok(db)
    }

    /// Open a private in-memory database
    ///
    /// The pool is pinned to a single connection that never expires, since each
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    ///
    /// Checks the current schema version and applies any pending migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        if !schema::needs_migration(current_version.0) {
            return Ok(());
        }

        for version in schema::get_pending_migrations(current_version.0) {
            let mut tx = self.pool.begin().await?;
            for statement in schema::migration_statements(version) {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(version, "applied queue schema migration");
        }

        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
