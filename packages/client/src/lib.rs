//! Realtime chat session client for Kaiwa.
//!
//! This library manages the single realtime connection of the club mobile
//! application: connection lifecycle with bounded automatic reconnection,
//! conversation-room membership, fire-and-forget message sends, and
//! reconciliation of optimistic local messages against server echoes.

pub mod domain;
pub mod infrastructure;
pub mod repl;
pub mod session;

// Re-export entry points
pub use repl::run_client;
pub use session::{ChatSession, ConnectionState, SessionConfig, SessionError, SessionStatus};
