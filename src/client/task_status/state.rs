//! Channel lifecycle as a transition table.
//!
//! ```text
//!            Connect                 HandshakeSucceeded
//!   Idle ───────────────▶ Connecting ──────────────────▶ Open
//!                          │    ▲                        │
//!      HandshakeFailed     │    │ RetryDue               │ TransportClosed
//!      (auto_reconnect)    ▼    │                        │ (not terminal, auto_reconnect)
//!                        Reconnecting ◀──────────────────┘
//! ```
//!
//! Everything else ends in `Closed`, or `Failed` for errors a retry cannot
//! fix. `Connect` and `Disconnect` are accepted from any state.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
    /// Closed by an error no retry can fix
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Connect,
    HandshakeSucceeded,
    HandshakeFailed { recoverable: bool },
    /// A frame with a terminal status arrived
    TerminalFrame,
    /// The live transport ended; `terminal_seen` is the last observed status
    TransportClosed { terminal_seen: bool },
    RetryDue,
    Disconnect,
}

impl ChannelState {
    /// State after `event`; events that do not apply leave the state unchanged
    pub fn next(self, event: ChannelEvent, auto_reconnect: bool) -> ChannelState {
        use ChannelEvent as E;
        use ChannelState as S;

        let retry_or_close = if auto_reconnect { S::Reconnecting } else { S::Closed };
        match (self, event) {
            (_, E::Connect) => S::Connecting,
            (_, E::Disconnect) => S::Closed,
            (S::Connecting, E::HandshakeSucceeded) => S::Open,
            (S::Connecting, E::HandshakeFailed { recoverable: false }) => S::Failed,
            (S::Connecting, E::HandshakeFailed { recoverable: true }) => retry_or_close,
            (S::Open, E::TerminalFrame) => S::Closed,
            (S::Open, E::TransportClosed { terminal_seen: true }) => S::Closed,
            (S::Open, E::TransportClosed { terminal_seen: false }) => retry_or_close,
            (S::Reconnecting, E::RetryDue) => S::Connecting,
            (state, _) => state,
        }
    }

    /// No transport is live and none is scheduled
    pub fn is_closed(&self) -> bool {
        matches!(self, ChannelState::Idle | ChannelState::Closed | ChannelState::Failed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Reconnecting => "reconnecting",
            ChannelState::Closed => "closed",
            ChannelState::Failed => "failed",
        };
        f.write_str(name)
    }
}
