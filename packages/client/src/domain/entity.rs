//! Core domain models for the chat session client.

use serde::{Deserialize, Serialize};

use super::value_object::{ConversationId, MessageContent, MessageId, SenderId};

/// Delivery state of a chat message as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryState {
    /// Queued optimistically, not yet confirmed by the server.
    Pending,
    /// Echoed back by the server.
    Confirmed,
    /// No confirmation arrived within the reconciliation window.
    Failed,
}

/// Represents a chat message in the domain model.
///
/// An outgoing message starts as `Pending` and is reconciled later: either a
/// server event carrying the same conversation and content confirms it, or
/// it is marked `Failed` after a bounded timeout. Inbound server messages
/// are `Confirmed` from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Locally generated message identifier
    pub id: MessageId,
    /// Conversation the message belongs to
    pub conversation_id: ConversationId,
    /// Sender's member ID
    pub sender_id: SenderId,
    /// Message content
    pub content: MessageContent,
    /// Unix timestamp (milliseconds, UTC) when the message was created
    pub created_at: i64,
    /// Current delivery state
    pub delivery_state: DeliveryState,
}

impl ChatMessage {
    /// Create an optimistic outgoing message.
    pub fn pending(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: SenderId,
        content: MessageContent,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            content,
            created_at,
            delivery_state: DeliveryState::Pending,
        }
    }

    /// Create a server-confirmed message.
    pub fn confirmed(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: SenderId,
        content: MessageContent,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            content,
            created_at,
            delivery_state: DeliveryState::Confirmed,
        }
    }
}

/// Notification that the delivery state of a locally queued message changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryUpdate {
    /// Local identifier of the affected message
    pub message_id: MessageId,
    /// The new delivery state
    pub state: DeliveryState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::factory::MessageIdFactory;

    fn conversation() -> ConversationId {
        ConversationId::new("conv-1".to_string()).unwrap()
    }

    fn sender() -> SenderId {
        SenderId::new("member-1".to_string()).unwrap()
    }

    #[test]
    fn test_pending_message_state() {
        // テスト項目: 楽観的メッセージは Pending 状態で作成される
        // when (操作):
        let message = ChatMessage::pending(
            MessageIdFactory::generate(),
            conversation(),
            sender(),
            MessageContent::new("Hello!".to_string()).unwrap(),
            1000,
        );

        // then (期待する結果):
        assert_eq!(message.delivery_state, DeliveryState::Pending);
        assert_eq!(message.created_at, 1000);
    }

    #[test]
    fn test_confirmed_message_state() {
        // テスト項目: サーバ確定メッセージは Confirmed 状態で作成される
        // when (操作):
        let message = ChatMessage::confirmed(
            MessageIdFactory::generate(),
            conversation(),
            sender(),
            MessageContent::new("Hi!".to_string()).unwrap(),
            2000,
        );

        // then (期待する結果):
        assert_eq!(message.delivery_state, DeliveryState::Confirmed);
    }
}
