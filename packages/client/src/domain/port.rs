//! Ports (依存性の逆転のための trait 定義)
//!
//! セッション層はここで定義した trait にのみ依存し、具体的な実装
//! （WebSocket、HTTP トークン取得）は infrastructure 層が提供します。
//! テストではチャンネルベースのフェイクやモックに差し替えられます。

use async_trait::async_trait;

use super::{
    error::TransportError,
    value_object::AuthToken,
};

/// Supplies the bearer credential used to authenticate the realtime
/// connection.
///
/// Implementations are expected to consult a fast local cache first and fall
/// back to a slower refresh path. `None` means no usable credential exists
/// and the caller must prompt for re-authentication; the session never
/// retries automatically in that case.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return the current credential, or `None` when re-authentication is
    /// required.
    async fn get_token(&self) -> Option<AuthToken>;
}

/// One live bidirectional connection to the message server.
///
/// The session task is the exclusive owner of a transport; dropping it
/// releases the underlying socket.
#[async_trait]
pub trait Transport: Send {
    /// Write one text frame to the peer.
    ///
    /// Resolving means the frame was handed to the socket, nothing more.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// `None` means the connection is closed (peer close or stream end);
    /// `Some(Err(_))` is a socket-level failure. Frames are yielded in the
    /// order the transport emits them. Must be cancellation safe: the
    /// session polls this inside a `select!` alongside its command channel.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection gracefully. Best effort; errors are ignored.
    async fn close(&mut self);
}

/// Opens a fresh [`Transport`] per connection attempt.
///
/// There is no connection reuse at this level; every call dials a new
/// socket and authenticates it with the given credential.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Open and authenticate a new connection.
    async fn connect(&self, token: &AuthToken) -> Result<Box<dyn Transport>, TransportError>;
}
