//! Shared Module
//!
//! Types shared by the client side of the offline subsystem and the request
//! interception layer: wire frames, queued records, errors, and configuration.
//!
//! # Overview
//!
//! Everything here is platform-agnostic and serializable; none of it performs
//! I/O on its own.

/// Task status frames and client commands
pub mod frame;

/// Queued outbound records
pub mod record;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

// Re-export commonly used types
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{DeliveryError, FetchError, MalformedFrameError, StorageError, TransportError};
pub use frame::{ClientCommand, ProcessingStatus, TaskStatusFrame};
pub use record::PendingRecord;
