//! Session configuration.

use std::time::Duration;

use crate::domain::SenderId;

/// Connection attempts that take longer than this are abandoned.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed delay between automatic reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Automatic reconnection stops after this many consecutive failures.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Optimistic messages without a server echo are marked failed after this.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`ChatSession`](super::ChatSession).
///
/// The only required fields are the server origin and the authenticated
/// member's identity; all tuning knobs have defaults matching the mobile
/// client's behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket origin of the message server (e.g. `wss://chat.example.com/ws`)
    pub origin: String,
    /// Identity stamped on optimistic local messages
    pub sender_id: SenderId,
    /// Connection handshake timeout
    pub connect_timeout: Duration,
    /// Delay before each automatic reconnection attempt
    pub reconnect_delay: Duration,
    /// Automatic reconnection budget per connection
    pub max_reconnect_attempts: u32,
    /// Reconciliation window for optimistic messages
    pub pending_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with default tuning.
    pub fn new(origin: impl Into<String>, sender_id: SenderId) -> Self {
        Self {
            origin: origin.into(),
            sender_id,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
        }
    }

    /// Set the connection handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the delay between automatic reconnection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the automatic reconnection budget.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the reconciliation window for optimistic messages.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }
}
