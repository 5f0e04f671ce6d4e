//! In-process message server fixture for integration tests.
//!
//! Speaks just enough of the wire protocol to exercise the client: bearer
//! check on the upgrade request, per-connection room membership, and
//! broadcast of sent messages to every member of the room (including the
//! sender, which is what drives optimistic-message confirmation).

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::any,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast;

pub struct FixtureState {
    expected_token: String,
    /// Total connections accepted (after the bearer check)
    pub accepted: AtomicU32,
    /// Connections with index below this are dropped shortly after accept
    pub close_first: AtomicU32,
    broadcast: broadcast::Sender<(String, String)>,
}

pub struct TestServer {
    addr: SocketAddr,
    pub state: Arc<FixtureState>,
}

impl TestServer {
    pub async fn start(expected_token: &str) -> Self {
        let (tx, _) = broadcast::channel(64);
        let state = Arc::new(FixtureState {
            expected_token: expected_token.to_string(),
            accepted: AtomicU32::new(0),
            close_first: AtomicU32::new(0),
            broadcast: tx,
        });

        let app = Router::new()
            .route("/chat", any(chat_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn origin(&self) -> String {
        format!("ws://{}/chat", self.addr)
    }

    pub fn accepted(&self) -> u32 {
        self.state.accepted.load(Ordering::SeqCst)
    }
}

async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FixtureState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let expected = format!("Bearer {}", state.expected_token);
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == expected)
        .unwrap_or(false);
    if !authorized {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<FixtureState>) {
    let index = state.accepted.fetch_add(1, Ordering::SeqCst);
    if index < state.close_first.load(Ordering::SeqCst) {
        // Simulate an unsolicited server-side drop after the handshake.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = socket.close().await;
        return;
    }

    let mut joined: HashSet<String> = HashSet::new();
    let mut published = state.broadcast.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else { break };
                let Message::Text(text) = frame else { continue };
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                match value["type"].as_str() {
                    Some("joinRoom") => {
                        if let Some(id) = value["conversationId"].as_str() {
                            joined.insert(id.to_string());
                        }
                    }
                    Some("leaveRoom") => {
                        if let Some(id) = value["conversationId"].as_str() {
                            joined.remove(id);
                        }
                    }
                    Some("sendMessage") => {
                        let conversation =
                            value["conversationId"].as_str().unwrap_or_default().to_string();
                        let content = value["content"].as_str().unwrap_or_default().to_string();
                        let echo = serde_json::json!({
                            "type": "newMessage",
                            "conversationId": conversation,
                            "content": content,
                            "senderId": "member-1",
                            "createdAt": 1_700_000_000_000i64,
                        });
                        let _ = state.broadcast.send((conversation, echo.to_string()));
                    }
                    _ => {}
                }
            }
            event = published.recv() => {
                let Ok((conversation, frame)) = event else { continue };
                if joined.contains(&conversation)
                    && sender.send(Message::Text(frame.into())).await.is_err()
                {
                    break;
                }
            }
        }
    }
}
