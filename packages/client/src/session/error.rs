//! Session layer error definitions.

use thiserror::Error;

use crate::domain::TransportError;

/// Errors surfaced by session operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No usable credential, or the server rejected the presented one.
    /// Never retried automatically: retrying with the same credential
    /// cannot succeed, the caller must re-authenticate.
    #[error("no usable credential; re-authentication required")]
    Authentication,

    /// An operation requiring an active connection was attempted while
    /// disconnected or still connecting. Non-fatal; callers may retry
    /// after `connect()` resolves.
    #[error("not connected")]
    NotConnected,

    /// Socket-level failure. Eligible for bounded automatic reconnection
    /// when it occurs on an established connection.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The automatic reconnect budget is exhausted. Terminal for the
    /// current connection; an explicit `connect()` resets the budget.
    #[error("automatic reconnection gave up after {attempts} attempts")]
    MaxReconnectAttemptsExceeded { attempts: u32 },

    /// The background session task is gone (the session was dropped).
    #[error("session task is no longer running")]
    Closed,
}
