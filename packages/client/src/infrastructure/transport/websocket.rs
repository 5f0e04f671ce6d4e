//! WebSocket transport.
//!
//! Implements the transport port over tokio-tungstenite. Every connection
//! attempt dials a brand-new socket (no transport-level reuse) and
//! authenticates by placing the bearer credential on the upgrade request.
//! There is no polling fallback.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError,
        client::IntoClientRequest,
        http::{StatusCode, header},
        protocol::Message,
    },
};

use crate::domain::{AuthToken, Transport, TransportError, TransportFactory};

/// One live WebSocket connection.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
                Some(Ok(Message::Close(_))) => return None,
                // Ping/pong is handled by the protocol layer; binary frames
                // are not part of this protocol.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(TransportError::Socket(e.to_string()))),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Opens one fresh authenticated WebSocket connection per attempt.
pub struct WsTransportFactory {
    origin: String,
    connect_timeout: Duration,
}

impl WsTransportFactory {
    /// Create a factory dialing the given origin.
    ///
    /// # Arguments
    ///
    /// * `origin` - WebSocket URL of the message server
    /// * `connect_timeout` - Handshake deadline per attempt
    pub fn new(origin: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            origin: origin.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl TransportFactory for WsTransportFactory {
    async fn connect(&self, token: &AuthToken) -> Result<Box<dyn Transport>, TransportError> {
        let mut request = self
            .origin
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Socket(format!("invalid origin: {e}")))?;

        let bearer = format!("Bearer {}", token.as_str());
        let value = header::HeaderValue::from_str(&bearer)
            .map_err(|e| TransportError::Socket(format!("credential not header-safe: {e}")))?;
        request.headers_mut().insert(header::AUTHORIZATION, value);

        match tokio::time::timeout(self.connect_timeout, connect_async(request)).await {
            Ok(Ok((stream, _response))) => Ok(Box::new(WsTransport { stream })),
            Ok(Err(WsError::Http(response))) => {
                let status = response.status();
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    Err(TransportError::Unauthorized(format!(
                        "handshake rejected with HTTP {status}"
                    )))
                } else {
                    Err(TransportError::Socket(format!(
                        "handshake failed with HTTP {status}"
                    )))
                }
            }
            Ok(Err(e)) => Err(TransportError::Socket(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.connect_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_origin_is_rejected() {
        // テスト項目: 不正なオリジンはソケットを開かずにエラーになる
        // given (前提条件):
        let factory = WsTransportFactory::new("not a url", Duration::from_secs(1));
        let token = AuthToken::new("token".to_string()).unwrap();

        // when (操作):
        let result = factory.connect(&token).await;

        // then (期待する結果):
        assert!(matches!(result, Err(TransportError::Socket(_))));
    }

    #[tokio::test]
    async fn test_unreachable_origin_reports_socket_error() {
        // テスト項目: 接続先がない場合はソケットエラーになる
        // given (前提条件): ポート 9 (discard) には誰も居ない
        let factory = WsTransportFactory::new("ws://127.0.0.1:9/chat", Duration::from_secs(2));
        let token = AuthToken::new("token".to_string()).unwrap();

        // when (操作):
        let result = factory.connect(&token).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(TransportError::Socket(_)) | Err(TransportError::Timeout(_))
        ));
    }
}
