//! The chat session manager.
//!
//! [`ChatSession`] is a thin cloneable handle; the connection itself is
//! owned by a background task spawned in [`ChatSession::spawn`]. Handle
//! calls are forwarded over an mpsc command channel and answered through
//! oneshot replies, so exactly one task ever touches the transport and the
//! single-connection guarantee holds by construction.
//!
//! Connection lifecycle:
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake ok--> Connected
//! Connecting --handshake failed--> Error  (caller retries explicitly)
//! Connected --unsolicited loss--> Connecting  (bounded automatic retry)
//! Connected --disconnect()--> Disconnected
//! ```
//!
//! Automatic reconnection runs only after an unsolicited loss of an
//! established connection, waits a fixed delay per attempt, and stops after
//! the configured budget or on any authentication failure. Failures outside
//! a caller's call stack are published through the status watch channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use kaiwa_shared::time::now_unix_millis;

use crate::domain::{
    ChatMessage, ConversationId, DeliveryState, DeliveryUpdate, MessageContent, MessageId,
    MessageIdFactory, TokenProvider, Transport, TransportError, TransportFactory,
};
use crate::infrastructure::dto::websocket::{ClientSignal, ServerSignal, parse_server_signal};

use super::{
    config::SessionConfig,
    error::SessionError,
    listeners::{ListenerId, Listeners},
    outbox::Outbox,
    reconnect::ReconnectPolicy,
    state::{ConnectionState, SessionStatus},
};

const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Cadence of the outbox reconciliation sweep.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Commands sent from the public handle to the background session task.
enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    JoinRoom {
        conversation_id: ConversationId,
    },
    LeaveRoom {
        conversation_id: ConversationId,
    },
    SendMessage {
        conversation_id: ConversationId,
        content: MessageContent,
        reply: oneshot::Sender<Result<MessageId, SessionError>>,
    },
}

/// Handle to the realtime chat session.
///
/// Cheap to clone; all clones drive the same underlying connection. The
/// embedding application is expected to create one session and pass it
/// through its context, which preserves "one logical connection per app"
/// without global state.
#[derive(Clone)]
pub struct ChatSession {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<SessionStatus>,
    message_listeners: Arc<Listeners<ChatMessage>>,
    delivery_listeners: Arc<Listeners<DeliveryUpdate>>,
}

impl ChatSession {
    /// Spawn the background session task and return a handle to it.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection origin, identity, and tuning
    /// * `tokens` - Credential source consulted on every connection attempt
    /// * `transports` - Opens one fresh transport per attempt
    pub fn spawn(
        config: SessionConfig,
        tokens: Arc<dyn TokenProvider>,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SessionStatus::disconnected());
        let message_listeners = Arc::new(Listeners::new());
        let delivery_listeners = Arc::new(Listeners::new());

        let task = SessionTask {
            policy: ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_delay),
            outbox: Outbox::new(config.pending_timeout),
            rooms: HashSet::new(),
            config,
            tokens,
            transports,
            status_tx,
            message_listeners: message_listeners.clone(),
            delivery_listeners: delivery_listeners.clone(),
        };
        tokio::spawn(task.run(cmd_rx));

        Self {
            cmd_tx,
            status_rx,
            message_listeners,
            delivery_listeners,
        }
    }

    /// Establish the connection.
    ///
    /// Idempotent: when already connected this resolves immediately, and
    /// concurrent callers share one in-flight attempt instead of opening a
    /// second socket. Resets the automatic reconnection budget.
    ///
    /// # Errors
    ///
    /// * `Authentication` - no usable credential, or the server rejected it
    /// * `Transport` - the handshake failed at the socket level
    /// * `Closed` - the session task is gone
    pub async fn connect(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Tear down the connection.
    ///
    /// Idempotent. Cancels any scheduled automatic reconnection and resets
    /// the retry budget; no late event from a torn-down transport can flip
    /// the state afterwards.
    pub async fn disconnect(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Disconnect { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// Join a conversation room.
    ///
    /// Dropped with a warning when not connected; the caller may retry once
    /// `connect()` resolves. Joining a room twice is a no-op.
    pub async fn join_room(&self, conversation_id: ConversationId) {
        let _ = self.cmd_tx.send(Command::JoinRoom { conversation_id }).await;
    }

    /// Leave a conversation room.
    ///
    /// Dropped with a warning when not connected, like [`join_room`].
    ///
    /// [`join_room`]: Self::join_room
    pub async fn leave_room(&self, conversation_id: ConversationId) {
        let _ = self
            .cmd_tx
            .send(Command::LeaveRoom { conversation_id })
            .await;
    }

    /// Send a message to a conversation.
    ///
    /// Resolves as soon as the signal is written to the transport; it does
    /// NOT wait for server acknowledgment. The persisted message arrives
    /// later through the inbound event stream and reconciles the optimistic
    /// entry identified by the returned [`MessageId`]. There is no internal
    /// retry and no queueing while disconnected.
    ///
    /// # Errors
    ///
    /// * `NotConnected` - no established connection; nothing was emitted
    /// * `Transport` - the write failed (the connection is then treated as lost)
    /// * `Closed` - the session task is gone
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        content: MessageContent,
    ) -> Result<MessageId, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SendMessage {
                conversation_id,
                content,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Register a callback invoked once per inbound message.
    ///
    /// Broadcast semantics: every registered callback sees every message.
    /// Callbacks run on the session task and must not block.
    pub fn on_message_received(
        &self,
        callback: impl Fn(&ChatMessage) + Send + Sync + 'static,
    ) -> ListenerId {
        self.message_listeners.register(callback)
    }

    /// Deregister an inbound-message callback.
    pub fn off_message_received(&self, id: ListenerId) -> bool {
        self.message_listeners.deregister(id)
    }

    /// Register a callback for delivery-state changes of sent messages
    /// (`Confirmed` on a matching server echo, `Failed` on expiry).
    pub fn on_delivery_update(
        &self,
        callback: impl Fn(&DeliveryUpdate) + Send + Sync + 'static,
    ) -> ListenerId {
        self.delivery_listeners.register(callback)
    }

    /// Deregister a delivery-update callback.
    pub fn off_delivery_update(&self, id: ListenerId) -> bool {
        self.delivery_listeners.deregister(id)
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch channel for status transitions, for UIs that render
    /// connecting/reconnecting/error affordances.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }
}

enum ConnectedOutcome {
    /// `disconnect()` was called; state is already Disconnected.
    CallerDisconnected,
    /// The connection was lost without the caller asking for it.
    TransportLost,
    /// Every handle is gone.
    Shutdown,
}

enum ReconnectOutcome {
    Connected(Box<dyn Transport>),
    /// Gave up (budget exhausted, credential failure, or caller disconnect).
    Stopped,
    Shutdown,
}

enum FrameOutcome {
    Handled,
    ConnectionLost,
}

/// Background task owning the transport and all session state.
struct SessionTask {
    config: SessionConfig,
    tokens: Arc<dyn TokenProvider>,
    transports: Arc<dyn TransportFactory>,
    status_tx: watch::Sender<SessionStatus>,
    message_listeners: Arc<Listeners<ChatMessage>>,
    delivery_listeners: Arc<Listeners<DeliveryUpdate>>,
    rooms: HashSet<ConversationId>,
    outbox: Outbox,
    policy: ReconnectPolicy,
}

impl SessionTask {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Disconnected: wait for commands, keep reconciling the outbox.
            let established = tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { return };
                    self.handle_idle_command(cmd).await
                }
                _ = sweep.tick(), if !self.outbox.is_empty() => {
                    self.expire_pending();
                    None
                }
            };
            let Some(mut transport) = established else {
                continue;
            };

            loop {
                match self
                    .run_connected(&mut transport, &mut cmd_rx, &mut sweep)
                    .await
                {
                    ConnectedOutcome::Shutdown => {
                        transport.close().await;
                        return;
                    }
                    ConnectedOutcome::CallerDisconnected => {
                        transport.close().await;
                        break;
                    }
                    ConnectedOutcome::TransportLost => {
                        // The transport is dropped before any retry, so a
                        // stale socket cannot raise further events.
                        drop(transport);
                        match self.run_reconnect(&mut cmd_rx, &mut sweep).await {
                            ReconnectOutcome::Connected(next) => {
                                transport = next;
                            }
                            ReconnectOutcome::Stopped => break,
                            ReconnectOutcome::Shutdown => return,
                        }
                    }
                }
            }
        }
    }

    /// Handle one command while no transport exists. Returns the new
    /// transport when a connect succeeded.
    async fn handle_idle_command(&mut self, cmd: Command) -> Option<Box<dyn Transport>> {
        match cmd {
            Command::Connect { reply } => {
                // An explicit connect always starts with a fresh retry budget.
                self.policy.reset();
                match self.establish().await {
                    Ok(transport) => {
                        let _ = reply.send(Ok(()));
                        Some(transport)
                    }
                    Err(error) => {
                        let _ = reply.send(Err(error));
                        None
                    }
                }
            }
            Command::Disconnect { reply } => {
                tracing::debug!("disconnect requested while already disconnected");
                let _ = reply.send(());
                None
            }
            Command::JoinRoom { conversation_id } => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "join dropped; not connected"
                );
                None
            }
            Command::LeaveRoom { conversation_id } => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    "leave dropped; not connected"
                );
                None
            }
            Command::SendMessage { reply, .. } => {
                let _ = reply.send(Err(SessionError::NotConnected));
                None
            }
        }
    }

    /// One caller-initiated connection attempt.
    async fn establish(&mut self) -> Result<Box<dyn Transport>, SessionError> {
        self.set_status(ConnectionState::Connecting, None);
        tracing::info!(origin = %self.config.origin, "connecting");

        let Some(token) = self.tokens.get_token().await else {
            tracing::warn!("no credential available; connect refused");
            self.set_status(
                ConnectionState::Disconnected,
                Some(SessionError::Authentication),
            );
            return Err(SessionError::Authentication);
        };

        match self.transports.connect(&token).await {
            Ok(transport) => {
                tracing::info!("connected");
                self.policy.reset();
                self.set_status(ConnectionState::Connected, None);
                Ok(transport)
            }
            Err(TransportError::Unauthorized(reason)) => {
                tracing::warn!(reason = %reason, "credential rejected during handshake");
                self.set_status(ConnectionState::Error, Some(SessionError::Authentication));
                Err(SessionError::Authentication)
            }
            Err(error) => {
                tracing::warn!(error = %error, "connection attempt failed");
                let session_error = SessionError::Transport(error);
                self.set_status(ConnectionState::Error, Some(session_error.clone()));
                Err(session_error)
            }
        }
    }

    /// Event loop while a transport is established.
    async fn run_connected(
        &mut self,
        transport: &mut Box<dyn Transport>,
        cmd_rx: &mut mpsc::Receiver<Command>,
        sweep: &mut Interval,
    ) -> ConnectedOutcome {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        return ConnectedOutcome::Shutdown;
                    };
                    match cmd {
                        Command::Connect { reply } => {
                            // Already connected; idempotent.
                            let _ = reply.send(Ok(()));
                        }
                        Command::Disconnect { reply } => {
                            tracing::info!("disconnecting");
                            self.teardown();
                            let _ = reply.send(());
                            return ConnectedOutcome::CallerDisconnected;
                        }
                        Command::JoinRoom { conversation_id } => {
                            if !self.rooms.insert(conversation_id.clone()) {
                                tracing::debug!(
                                    conversation_id = %conversation_id,
                                    "join skipped; already a member"
                                );
                                continue;
                            }
                            let signal = ClientSignal::join(&conversation_id);
                            if let Err(error) = emit_signal(transport, &signal).await {
                                tracing::warn!(
                                    conversation_id = %conversation_id,
                                    error = %error,
                                    "join signal failed; connection lost"
                                );
                                return ConnectedOutcome::TransportLost;
                            }
                            tracing::info!(conversation_id = %conversation_id, "joined room");
                        }
                        Command::LeaveRoom { conversation_id } => {
                            if !self.rooms.remove(&conversation_id) {
                                tracing::debug!(
                                    conversation_id = %conversation_id,
                                    "leave skipped; not a member"
                                );
                                continue;
                            }
                            let signal = ClientSignal::leave(&conversation_id);
                            if let Err(error) = emit_signal(transport, &signal).await {
                                tracing::warn!(
                                    conversation_id = %conversation_id,
                                    error = %error,
                                    "leave signal failed; connection lost"
                                );
                                return ConnectedOutcome::TransportLost;
                            }
                            tracing::info!(conversation_id = %conversation_id, "left room");
                        }
                        Command::SendMessage { conversation_id, content, reply } => {
                            let message = ChatMessage::pending(
                                MessageIdFactory::generate(),
                                conversation_id,
                                self.config.sender_id.clone(),
                                content,
                                now_unix_millis(),
                            );
                            let signal = ClientSignal::send(
                                &message.conversation_id,
                                &message.content,
                            );
                            match emit_signal(transport, &signal).await {
                                Ok(()) => {
                                    let message_id = message.id;
                                    self.outbox.push(message, Instant::now());
                                    let _ = reply.send(Ok(message_id));
                                }
                                Err(error) => {
                                    tracing::warn!(error = %error, "send signal failed; connection lost");
                                    let _ = reply.send(Err(SessionError::Transport(error)));
                                    return ConnectedOutcome::TransportLost;
                                }
                            }
                        }
                    }
                }
                event = transport.recv() => {
                    match event {
                        Some(Ok(text)) => {
                            if let FrameOutcome::ConnectionLost = self.handle_frame(&text) {
                                return ConnectedOutcome::TransportLost;
                            }
                        }
                        Some(Err(error)) => {
                            tracing::warn!(error = %error, "socket failure on established connection");
                            return ConnectedOutcome::TransportLost;
                        }
                        None => {
                            tracing::info!("connection closed by the server");
                            return ConnectedOutcome::TransportLost;
                        }
                    }
                }
                _ = sweep.tick(), if !self.outbox.is_empty() => {
                    self.expire_pending();
                }
            }
        }
    }

    /// Bounded automatic reconnection after an unsolicited loss.
    ///
    /// `connect()` calls arriving while this runs join the in-flight attempt
    /// instead of opening their own socket; they are answered with the
    /// outcome of the cycle that resolves them.
    async fn run_reconnect(
        &mut self,
        cmd_rx: &mut mpsc::Receiver<Command>,
        sweep: &mut Interval,
    ) -> ReconnectOutcome {
        // Server-side membership died with the socket; the UI re-joins the
        // rooms it still displays once the connection is back.
        self.rooms.clear();
        let mut waiters: Vec<oneshot::Sender<Result<(), SessionError>>> = Vec::new();

        loop {
            let Some(delay) = self.policy.next_attempt() else {
                let attempts = self.policy.max_attempts();
                tracing::warn!(attempts, "reconnect budget exhausted; giving up");
                let error = SessionError::MaxReconnectAttemptsExceeded { attempts };
                self.set_status(ConnectionState::Disconnected, Some(error.clone()));
                self.policy.reset();
                for waiter in waiters {
                    let _ = waiter.send(Err(error.clone()));
                }
                return ReconnectOutcome::Stopped;
            };
            self.set_status(ConnectionState::Connecting, None);
            tracing::info!(
                attempt = self.policy.attempt_count(),
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect attempt"
            );

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else {
                            return ReconnectOutcome::Shutdown;
                        };
                        match cmd {
                            Command::Connect { reply } => waiters.push(reply),
                            Command::Disconnect { reply } => {
                                tracing::info!("disconnect requested; reconnect cancelled");
                                self.teardown();
                                let _ = reply.send(());
                                for waiter in waiters {
                                    let _ = waiter.send(Err(SessionError::NotConnected));
                                }
                                return ReconnectOutcome::Stopped;
                            }
                            Command::JoinRoom { conversation_id } => {
                                tracing::warn!(
                                    conversation_id = %conversation_id,
                                    "join dropped; not connected"
                                );
                            }
                            Command::LeaveRoom { conversation_id } => {
                                tracing::warn!(
                                    conversation_id = %conversation_id,
                                    "leave dropped; not connected"
                                );
                            }
                            Command::SendMessage { reply, .. } => {
                                let _ = reply.send(Err(SessionError::NotConnected));
                            }
                        }
                    }
                    _ = sweep.tick(), if !self.outbox.is_empty() => {
                        self.expire_pending();
                    }
                }
            }

            let Some(token) = self.tokens.get_token().await else {
                tracing::warn!("credential no longer available; reconnect stopped");
                self.set_status(
                    ConnectionState::Disconnected,
                    Some(SessionError::Authentication),
                );
                for waiter in waiters {
                    let _ = waiter.send(Err(SessionError::Authentication));
                }
                return ReconnectOutcome::Stopped;
            };

            match self.transports.connect(&token).await {
                Ok(transport) => {
                    tracing::info!("reconnected");
                    self.policy.reset();
                    self.set_status(ConnectionState::Connected, None);
                    for waiter in waiters {
                        let _ = waiter.send(Ok(()));
                    }
                    return ReconnectOutcome::Connected(transport);
                }
                Err(TransportError::Unauthorized(reason)) => {
                    tracing::warn!(reason = %reason, "credential rejected; reconnect stopped");
                    self.set_status(
                        ConnectionState::Disconnected,
                        Some(SessionError::Authentication),
                    );
                    for waiter in waiters {
                        let _ = waiter.send(Err(SessionError::Authentication));
                    }
                    return ReconnectOutcome::Stopped;
                }
                Err(error) => {
                    tracing::warn!(
                        attempt = self.policy.attempt_count(),
                        error = %error,
                        "reconnect attempt failed"
                    );
                }
            }
        }
    }

    /// Dispatch one inbound frame.
    ///
    /// Payloads are validated at this boundary; anything malformed is logged
    /// and skipped rather than crashing or reaching callbacks.
    fn handle_frame(&mut self, text: &str) -> FrameOutcome {
        match parse_server_signal(text) {
            Ok(ServerSignal::NewMessage(dto)) => {
                match ChatMessage::try_from(dto) {
                    Ok(message) => {
                        if let Some(message_id) = self
                            .outbox
                            .confirm(&message.conversation_id, &message.content)
                        {
                            self.delivery_listeners.emit(&DeliveryUpdate {
                                message_id,
                                state: DeliveryState::Confirmed,
                            });
                        }
                        self.message_listeners.emit(&message);
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "dropping inbound message failing validation");
                    }
                }
                FrameOutcome::Handled
            }
            Ok(ServerSignal::Error { message }) => {
                tracing::warn!(message = %message, "server reported a connection error");
                FrameOutcome::ConnectionLost
            }
            Err(error) => {
                tracing::warn!(error = %error, "dropping malformed frame");
                FrameOutcome::Handled
            }
        }
    }

    /// Reset to a clean disconnected state (caller-initiated).
    fn teardown(&mut self) {
        self.rooms.clear();
        self.policy.reset();
        self.set_status(ConnectionState::Disconnected, None);
    }

    /// Mark entries past the reconciliation window as failed.
    fn expire_pending(&mut self) {
        for message_id in self.outbox.expire(Instant::now()) {
            tracing::warn!(
                message_id = %message_id,
                "pending message expired without server confirmation"
            );
            self.delivery_listeners.emit(&DeliveryUpdate {
                message_id,
                state: DeliveryState::Failed,
            });
        }
    }

    fn set_status(&self, state: ConnectionState, last_error: Option<SessionError>) {
        self.status_tx.send_replace(SessionStatus { state, last_error });
    }
}

/// Encode and write one outbound signal.
async fn emit_signal(
    transport: &mut Box<dyn Transport>,
    signal: &ClientSignal,
) -> Result<(), TransportError> {
    let text = serde_json::to_string(signal)
        .map_err(|e| TransportError::Socket(format!("failed to encode signal: {e}")))?;
    transport.send_text(&text).await
}
