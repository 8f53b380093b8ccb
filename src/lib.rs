//! Procurement Offline - Main Library
//!
//! Offline task-status and sync subsystem of the procurement client.
//!
//! # Overview
//!
//! This library provides:
//! - A durable queue of outbound records that survives restarts
//! - Process-wide connectivity tracking with edge-triggered subscriptions
//! - Sync passes that drain the queue when the network returns
//! - A live, auto-reconnecting status channel per server-side task
//! - A versioned request interceptor with cache-first and network-first
//!   strategies
//!
//! # Module Structure
//!
//! - **`shared`** - Wire frames, queued records, errors, configuration
//! - **`client`** - Queue store, monitor, sync, task status channel
//! - **`interceptor`** - Request interception and response caching
//!
//! # Usage
//!
//! ```rust,no_run
//! use procurement_offline::client::offline::OfflineManager;
//! use procurement_offline::client::sync::{ConnectivityMonitor, HttpDelivery, SyncCoordinator};
//! use procurement_offline::client::{Config, LocalDatabase};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let db = LocalDatabase::open(config.database_path()).await?;
//! let coordinator = SyncCoordinator::new(
//!     Arc::new(db),
//!     ConnectivityMonitor::new(true),
//!     Arc::new(HttpDelivery::from_config(&config)?),
//! );
//! let offline = OfflineManager::new(coordinator);
//! offline.save_offline("order-17", serde_json::json!({ "sku": "A-1", "qty": 3 })).await?;
//! offline.sync_now().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod interceptor;
pub mod shared;
