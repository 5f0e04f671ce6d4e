//! Domain layer error definitions.

use std::time::Duration;

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// ConversationId validation error
    #[error("ConversationId cannot be empty")]
    ConversationIdEmpty,

    /// ConversationId too long error
    #[error("ConversationId cannot exceed {max} characters (got {actual})")]
    ConversationIdTooLong { max: usize, actual: usize },

    /// SenderId validation error
    #[error("SenderId cannot be empty")]
    SenderIdEmpty,

    /// SenderId too long error
    #[error("SenderId cannot exceed {max} characters (got {actual})")]
    SenderIdTooLong { max: usize, actual: usize },

    /// MessageContent validation error
    #[error("MessageContent cannot be empty")]
    MessageContentEmpty,

    /// MessageContent too long error
    #[error("MessageContent cannot exceed {max} characters (got {actual})")]
    MessageContentTooLong { max: usize, actual: usize },

    /// AuthToken validation error
    #[error("AuthToken cannot be empty")]
    AuthTokenEmpty,

    /// AuthToken too long error
    #[error("AuthToken cannot exceed {max} characters (got {actual})")]
    AuthTokenTooLong { max: usize, actual: usize },
}

/// Socket-level failures reported by a transport implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection attempt did not complete within the configured window
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the handshake credential (HTTP 401/403)
    #[error("handshake rejected: {0}")]
    Unauthorized(String),

    /// Any other socket-level failure (I/O error, protocol error, bad frame)
    #[error("socket failure: {0}")]
    Socket(String),
}
