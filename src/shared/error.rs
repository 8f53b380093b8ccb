//! Shared Error Types
//!
//! This module defines the error taxonomy of the offline subsystem. Every
//! failure path either resolves to a state transition or surfaces as one of
//! these values; nothing in the crate is allowed to panic on I/O failure.
//!
//! # Error Categories
//!
//! - `StorageError` - Queue store read/write failures (propagated to the caller)
//! - `TransportError` - Task status channel handshake or mid-stream failures
//! - `DeliveryError` - A single record failed to reach the sync endpoint
//! - `MalformedFrameError` - A status frame could not be parsed (logged, dropped)
//! - `FetchError` - The interception layer could not produce a response
//!
//! # Usage
//!
//! ```rust
//! use procurement_offline::shared::error::StorageError;
//!
//! let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
//! let error = StorageError::from(bad);
//! assert!(error.to_string().starts_with("Stored payload is not valid JSON"));
//! ```
use std::time::Duration;
use thiserror::Error;

/// Queue store failure (quota, corruption, closed database)
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQL engine rejected the operation
    #[error("Storage engine error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored payload could not be encoded or decoded
    #[error("Stored payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database file or its directory could not be prepared
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Task status transport failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel URL could not be built; retrying cannot fix this
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    /// The WebSocket handshake was refused or failed
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Human-readable error message
        message: String,
    },

    /// The handshake did not finish in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The live stream reported an error
    #[error("Stream error: {message}")]
    Stream {
        /// Human-readable error message
        message: String,
    },
}

impl TransportError {
    /// Create a new handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a new stream error
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Whether a later reconnect attempt could succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }
}

/// Failure to deliver one pending record
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("Sync endpoint returned HTTP {status}")]
    Status {
        /// HTTP status code received
        status: u16,
    },
}

/// A status frame that failed to parse
#[derive(Debug, Error)]
#[error("Malformed status frame: {message}")]
pub struct MalformedFrameError {
    /// What was wrong with the frame
    pub message: String,
    /// The raw text as received
    pub raw: String,
}

impl MalformedFrameError {
    /// Create a new malformed frame error
    pub fn new(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: raw.into(),
        }
    }
}

/// The interception layer could not serve a request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network was unreachable and no cached fallback applied
    #[error("Network unreachable for {url}: {message}")]
    Network {
        /// Request URL
        url: String,
        /// Human-readable error message
        message: String,
    },

    /// The cache backend failed
    #[error("Cache error: {message}")]
    Cache {
        /// Human-readable error message
        message: String,
    },
}

impl FetchError {
    /// Create a new network error
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_from_serde() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let error: StorageError = result.unwrap_err().into();
        match error {
            StorageError::Serialization(_) => {}
            _ => panic!("Expected Serialization from serde error"),
        }
    }

    #[test]
    fn test_transport_error_recoverable() {
        assert!(TransportError::handshake("refused").is_recoverable());
        assert!(TransportError::HandshakeTimeout(Duration::from_secs(10)).is_recoverable());
        assert!(!TransportError::InvalidUrl("nope".to_string()).is_recoverable());
    }

    #[test]
    fn test_delivery_status_display() {
        let error = DeliveryError::Status { status: 503 };
        assert_eq!(error.to_string(), "Sync endpoint returned HTTP 503");
    }

    #[test]
    fn test_malformed_frame_keeps_raw() {
        let error = MalformedFrameError::new("missing field `status`", "{\"task_id\":\"t\"}");
        assert_eq!(error.raw, "{\"task_id\":\"t\"}");
        assert!(error.to_string().contains("missing field"));
    }

    #[test]
    fn test_fetch_error_display() {
        let error = FetchError::network("http://host/app.js", "connection refused");
        let display = format!("{}", error);
        assert!(display.contains("http://host/app.js"));
        assert!(display.contains("connection refused"));
    }
}
