//! Task Status Frames
//!
//! Wire types exchanged over a task status channel. The server pushes one
//! [`TaskStatusFrame`] per status change of a long-running job; the client
//! may send [`ClientCommand`]s back while the channel is open.
//!
//! Frames arrive as JSON:
//!
//! ```json
//! { "task_id": "t-1", "status": "matching", "progress": 50,
//!   "message": "Searching catalog", "data": null, "timestamp": "2026-01-01T10:00:00Z" }
//! ```

use crate::shared::error::MalformedFrameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing stage of a server-side task
///
/// Unknown stage names are kept verbatim in [`ProcessingStatus::Other`] and
/// presented as [`ProcessingStatus::Pending`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingStatus {
    Pending,
    Parsing,
    Matching,
    Optimizing,
    Completed,
    Error,
    /// A stage this client does not know about
    Other(String),
}

impl ProcessingStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Matching => "matching",
            Self::Optimizing => "optimizing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }

    /// Status used for display: unknown names collapse to `Pending`
    pub fn effective(&self) -> ProcessingStatus {
        match self {
            Self::Other(_) => Self::Pending,
            known => known.clone(),
        }
    }

    /// No frames follow a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self.effective() {
            Self::Parsing => "Parsing document",
            Self::Matching => "Searching products",
            Self::Optimizing => "Optimizing",
            Self::Completed => "Completed",
            Self::Error => "Error",
            _ => "Waiting",
        }
    }

    /// Indicator color name
    pub fn color(&self) -> &'static str {
        match self.effective() {
            Self::Parsing => "blue",
            Self::Matching => "indigo",
            Self::Optimizing => "purple",
            Self::Completed => "green",
            Self::Error => "red",
            _ => "gray",
        }
    }
}

impl From<String> for ProcessingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "parsing" => Self::Parsing,
            "matching" => Self::Matching,
            "optimizing" => Self::Optimizing,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Other(value),
        }
    }
}

impl From<ProcessingStatus> for String {
    fn from(value: ProcessingStatus) -> Self {
        match value {
            ProcessingStatus::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status update for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusFrame {
    pub task_id: String,
    pub status: ProcessingStatus,
    /// Percentage in `[0, 100]`
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    /// Final result on completion
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Server-issued time, kept as sent
    #[serde(default)]
    pub timestamp: String,
}

impl TaskStatusFrame {
    /// Parse a frame from its JSON text
    ///
    /// Progress outside `[0, 100]` is clamped; a non-finite progress is rejected.
    pub fn parse(text: &str) -> Result<Self, MalformedFrameError> {
        let mut frame: TaskStatusFrame =
            serde_json::from_str(text).map_err(|e| MalformedFrameError::new(e.to_string(), text))?;

        if !frame.progress.is_finite() {
            return Err(MalformedFrameError::new("progress is not a finite number", text));
        }
        if !(0.0..=100.0).contains(&frame.progress) {
            tracing::debug!(
                task_id = %frame.task_id,
                progress = frame.progress,
                "clamping out-of-range progress"
            );
            frame.progress = frame.progress.clamp(0.0, 100.0);
        }
        Ok(frame)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProcessingStatus::Completed
    }
}

/// Message sent from the client over an open channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Keep-alive
    Ping,
    /// Ask the server to run its demo pipeline for this task
    StartDemo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_frame() {
        let frame = TaskStatusFrame::parse(
            r#"{"task_id":"t-1","status":"matching","progress":50,"message":"Searching","data":null,"timestamp":"2026-01-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(frame.task_id, "t-1");
        assert_eq!(frame.status, ProcessingStatus::Matching);
        assert_eq!(frame.progress, 50.0);
        assert_eq!(frame.message.as_deref(), Some("Searching"));
        assert!(frame.data.is_none());
    }

    #[test]
    fn test_unknown_status_kept_verbatim() {
        let frame =
            TaskStatusFrame::parse(r#"{"task_id":"t","status":"ranking","progress":5}"#).unwrap();
        assert_eq!(frame.status, ProcessingStatus::Other("ranking".to_string()));
        assert_eq!(frame.status.effective(), ProcessingStatus::Pending);
        assert_eq!(frame.status.label(), "Waiting");

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["status"], "ranking");
    }

    #[test]
    fn test_missing_status_is_malformed() {
        let err = TaskStatusFrame::parse(r#"{"task_id":"t","progress":5}"#).unwrap_err();
        assert!(err.message.contains("status"));
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = TaskStatusFrame::parse("pong").unwrap_err();
        assert_eq!(err.raw, "pong");
    }

    #[test]
    fn test_progress_clamped() {
        let frame =
            TaskStatusFrame::parse(r#"{"task_id":"t","status":"parsing","progress":140}"#).unwrap();
        assert_eq!(frame.progress, 100.0);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ProcessingStatus::Completed.is_terminal());
        assert!(ProcessingStatus::Error.is_terminal());
        assert!(!ProcessingStatus::Optimizing.is_terminal());
        assert!(!ProcessingStatus::Other("done".to_string()).is_terminal());
    }

    #[test]
    fn test_colors() {
        assert_eq!(ProcessingStatus::Parsing.color(), "blue");
        assert_eq!(ProcessingStatus::Completed.color(), "green");
        assert_eq!(ProcessingStatus::Other("x".to_string()).color(), "gray");
    }

    #[test]
    fn test_client_command_wire_shape() {
        assert_eq!(
            serde_json::to_string(&ClientCommand::Ping).unwrap(),
            r#"{"action":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientCommand::StartDemo).unwrap(),
            r#"{"action":"start_demo"}"#
        );
    }
}
