//! Client Module
//!
//! The offline side of the procurement client: durable queueing, connectivity
//! tracking, background sync and live task status.
//!
//! # Architecture
//!
//! - **`config`** - Resolves server, sync and WebSocket URLs
//! - **`local_db`** - SQLite-backed queue store
//! - **`offline`** - Queue store trait, offline facade, connectivity banner
//! - **`sync`** - Connectivity monitor, sync coordinator, background sync
//! - **`task_status`** - Per-task status channel with reconnect
//! - **`main`** - `task-watch` command-line entry point (binary)
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - task-watch binary
//! ├── config.rs       - Configuration wrapper
//! ├── local_db/       - SQLite queue store and migrations
//! ├── offline/        - Facade, queue trait, banner
//! ├── sync/           - Monitor, coordinator, delivery, background sync
//! └── task_status/    - Channel state machine and transport
//! ```

pub mod config;
pub mod local_db;
pub mod offline;
pub mod sync;
pub mod task_status;

pub use config::Config;
pub use local_db::LocalDatabase;
pub use offline::{ConnectivityBanner, OfflineManager};
pub use sync::{BackgroundSync, ConnectivityMonitor, SyncCoordinator};
pub use task_status::{ChannelHandlers, ChannelState, TaskStatusChannel};
