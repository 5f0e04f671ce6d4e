//! Session layer: the realtime chat session manager.
//!
//! Owns the single live connection to the message server and mediates all
//! message traffic for the active user: connect/disconnect lifecycle,
//! bounded automatic reconnection, room membership, fire-and-forget sends,
//! and reconciliation of optimistic messages against server echoes.

pub mod config;
pub mod error;
pub mod listeners;
pub mod manager;
pub mod outbox;
pub mod reconnect;
pub mod state;

pub use config::SessionConfig;
pub use error::SessionError;
pub use listeners::ListenerId;
pub use manager::ChatSession;
pub use reconnect::ReconnectPolicy;
pub use state::{ConnectionState, SessionStatus};
