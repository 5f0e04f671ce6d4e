//! Interactive command-line chat client.
//!
//! Thin shell over [`ChatSession`] used for manual testing against a real
//! message server. Reads lines with rustyline on a blocking thread and
//! forwards them to the async side; inbound messages and delivery failures
//! are printed from registered listeners.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use kaiwa_shared::time::unix_millis_to_rfc3339;

use crate::domain::{AuthToken, ConversationId, MessageContent, SenderId};
use crate::infrastructure::{StaticTokenProvider, WsTransportFactory};
use crate::session::{ChatSession, SessionConfig};

/// Command-line arguments for the chat client.
#[derive(Debug, Parser)]
#[command(name = "kaiwa-client", about = "Realtime chat client for Kaiwa")]
pub struct ClientArgs {
    /// WebSocket origin of the message server
    #[arg(long, default_value = "ws://127.0.0.1:8080/chat")]
    pub origin: String,

    /// Member ID to chat as
    #[arg(long)]
    pub sender_id: String,

    /// Bearer token for the connection handshake
    #[arg(long)]
    pub token: String,

    /// Conversation room to join on startup
    #[arg(long)]
    pub room: Option<String>,

    /// Handshake timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
}

/// Run the interactive client until EOF or `/quit`.
pub async fn run_client(args: ClientArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sender_id = SenderId::new(args.sender_id)?;
    let token = AuthToken::new(args.token)?;
    let connect_timeout = Duration::from_secs(args.connect_timeout_secs);

    let config = SessionConfig::new(args.origin.clone(), sender_id)
        .with_connect_timeout(connect_timeout);
    let tokens = Arc::new(StaticTokenProvider::new(token));
    let transports = Arc::new(WsTransportFactory::new(args.origin, connect_timeout));
    let session = ChatSession::spawn(config, tokens, transports);

    session.on_message_received(|message| {
        println!(
            "{} [{}] {}: {}",
            unix_millis_to_rfc3339(message.created_at),
            message.conversation_id,
            message.sender_id,
            message.content
        );
    });
    session.on_delivery_update(|update| {
        if update.state == crate::domain::DeliveryState::Failed {
            println!("(message {} was not delivered)", update.message_id);
        }
    });

    session.connect().await?;
    println!("connected; /join <room>, /leave <room>, /status, /quit");

    let mut active_room: Option<ConversationId> = None;
    if let Some(room) = args.room {
        let conversation = ConversationId::new(room)?;
        session.join_room(conversation.clone()).await;
        active_room = Some(conversation);
    }

    let mut lines = spawn_line_reader();
    while let Some(line) = lines.recv().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some("quit"), _) => break,
                (Some("status"), _) => {
                    let status = session.status();
                    match &status.last_error {
                        Some(error) => println!("{} (last error: {})", status.state, error),
                        None => println!("{}", status.state),
                    }
                }
                (Some("join"), Some(room)) => match ConversationId::new(room.to_string()) {
                    Ok(conversation) => {
                        session.join_room(conversation.clone()).await;
                        active_room = Some(conversation);
                    }
                    Err(error) => println!("invalid room: {error}"),
                },
                (Some("leave"), Some(room)) => match ConversationId::new(room.to_string()) {
                    Ok(conversation) => {
                        if active_room.as_ref() == Some(&conversation) {
                            active_room = None;
                        }
                        session.leave_room(conversation).await;
                    }
                    Err(error) => println!("invalid room: {error}"),
                },
                _ => println!("unknown command: /{command}"),
            }
            continue;
        }

        let Some(conversation) = active_room.clone() else {
            println!("no active room; /join one first");
            continue;
        };
        match MessageContent::new(line) {
            Ok(content) => {
                if let Err(error) = session.send_message(conversation, content).await {
                    println!("send failed: {error}");
                }
            }
            Err(error) => println!("invalid message: {error}"),
        }
    }

    session.disconnect().await;
    Ok(())
}

/// Read lines on a blocking thread; the channel closes on EOF or Ctrl-C.
fn spawn_line_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let Ok(mut editor) = DefaultEditor::new() else {
            tracing::error!("failed to initialize line editor");
            return;
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(error) => {
                    tracing::error!(error = %error, "line editor failure");
                    break;
                }
            }
        }
    });
    rx
}
