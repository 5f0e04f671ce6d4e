//! Observable connection state.

use std::fmt;

use super::error::SessionError;

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport exists and nothing is in flight.
    Disconnected,
    /// A connection or reconnection attempt is in flight.
    Connecting,
    /// The transport is established and usable.
    Connected,
    /// The last caller-initiated connection attempt failed; the caller
    /// decides whether to retry.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Snapshot published through the status watch channel.
///
/// Lifecycle failures that happen outside any caller's call stack (a failed
/// automatic reconnection, an exhausted retry budget) are reported here via
/// `last_error` rather than as return values, so the UI layer can render a
/// banner and a manual retry affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current connection state
    pub state: ConnectionState,
    /// The most recent lifecycle failure, cleared on a clean transition
    pub last_error: Option<SessionError>,
}

impl SessionStatus {
    /// Initial status: disconnected, no recorded failure.
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
        }
    }

    /// Whether the connection is currently usable.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
