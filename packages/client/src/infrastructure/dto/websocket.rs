//! WebSocket signal DTOs.
//!
//! The wire protocol is JSON text frames tagged by a camelCase `type` field,
//! matching what the message server emits to its mobile clients. Inbound
//! payloads are duck-typed on the server side, so everything is coerced
//! through the domain value objects before leaving this module.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ChatMessage, ConversationId, MessageContent, MessageIdFactory, SenderId, ValueObjectError,
};

/// Client-to-server signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientSignal {
    #[serde(rename_all = "camelCase")]
    JoinRoom { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { conversation_id: String },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: String,
        content: String,
    },
}

impl ClientSignal {
    /// Join signal for a conversation room.
    pub fn join(conversation_id: &ConversationId) -> Self {
        Self::JoinRoom {
            conversation_id: conversation_id.as_str().to_string(),
        }
    }

    /// Leave signal for a conversation room.
    pub fn leave(conversation_id: &ConversationId) -> Self {
        Self::LeaveRoom {
            conversation_id: conversation_id.as_str().to_string(),
        }
    }

    /// Send signal carrying conversation and content. The server stamps the
    /// sender from the authenticated connection.
    pub fn send(conversation_id: &ConversationId, content: &MessageContent) -> Self {
        Self::SendMessage {
            conversation_id: conversation_id.as_str().to_string(),
            content: content.as_str().to_string(),
        }
    }
}

/// Payload of an inbound `newMessage` signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageDto {
    pub conversation_id: String,
    pub content: String,
    pub sender_id: String,
    /// Unix timestamp (milliseconds) stamped by the server
    pub created_at: i64,
}

/// Server-to-client signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerSignal {
    /// A persisted message, broadcast to every member of its room.
    NewMessage(NewMessageDto),
    /// Server-side failure on this connection.
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

/// Parse one inbound text frame.
pub fn parse_server_signal(text: &str) -> Result<ServerSignal, serde_json::Error> {
    serde_json::from_str(text)
}

impl TryFrom<NewMessageDto> for ChatMessage {
    type Error = ValueObjectError;

    /// Coerce a wire payload into the domain model, assigning a fresh local
    /// id. Fails when any field violates the domain constraints.
    fn try_from(dto: NewMessageDto) -> Result<Self, Self::Error> {
        Ok(ChatMessage::confirmed(
            MessageIdFactory::generate(),
            ConversationId::new(dto.conversation_id)?,
            SenderId::new(dto.sender_id)?,
            MessageContent::new(dto.content)?,
            dto.created_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeliveryState;

    #[test]
    fn test_client_signal_join_encoding() {
        // テスト項目: joinRoom シグナルが camelCase の type タグ付きで直列化される
        // given (前提条件):
        let conversation = ConversationId::new("conv-1".to_string()).unwrap();

        // when (操作):
        let json = serde_json::to_string(&ClientSignal::join(&conversation)).unwrap();

        // then (期待する結果):
        assert_eq!(json, r#"{"type":"joinRoom","conversationId":"conv-1"}"#);
    }

    #[test]
    fn test_client_signal_send_encoding() {
        // テスト項目: sendMessage シグナルが会話 ID と内容を運ぶ
        // given (前提条件):
        let conversation = ConversationId::new("conv-1".to_string()).unwrap();
        let content = MessageContent::new("hello".to_string()).unwrap();

        // when (操作):
        let json = serde_json::to_string(&ClientSignal::send(&conversation, &content)).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            r#"{"type":"sendMessage","conversationId":"conv-1","content":"hello"}"#
        );
    }

    #[test]
    fn test_parse_new_message() {
        // テスト項目: newMessage シグナルをパースしてドメインモデルへ変換できる
        // given (前提条件):
        let json = r#"{
            "type": "newMessage",
            "conversationId": "conv-1",
            "content": "hello",
            "senderId": "member-2",
            "createdAt": 1700000000000
        }"#;

        // when (操作):
        let signal = parse_server_signal(json).unwrap();

        // then (期待する結果):
        let ServerSignal::NewMessage(dto) = signal else {
            panic!("expected newMessage, got {signal:?}");
        };
        let message = ChatMessage::try_from(dto).unwrap();
        assert_eq!(message.conversation_id.as_str(), "conv-1");
        assert_eq!(message.content.as_str(), "hello");
        assert_eq!(message.sender_id.as_str(), "member-2");
        assert_eq!(message.created_at, 1_700_000_000_000);
        assert_eq!(message.delivery_state, DeliveryState::Confirmed);
    }

    #[test]
    fn test_parse_error_signal() {
        // テスト項目: error シグナルをパースできる
        // given (前提条件):
        let json = r#"{"type":"error","message":"room unavailable"}"#;

        // when (操作):
        let signal = parse_server_signal(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            signal,
            ServerSignal::Error {
                message: "room unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        // テスト項目: 未知の type タグはパースエラーになる
        // when (操作):
        let result = parse_server_signal(r#"{"type":"presence","memberId":"m-1"}"#);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_garbage_fails() {
        // テスト項目: JSON でないフレームはパースエラーになる
        // when (操作):
        let result = parse_server_signal("definitely not json");

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_new_message_with_empty_content_rejected() {
        // テスト項目: 空内容の newMessage は境界で検証エラーになる
        // given (前提条件):
        let dto = NewMessageDto {
            conversation_id: "conv-1".to_string(),
            content: "".to_string(),
            sender_id: "member-2".to_string(),
            created_at: 0,
        };

        // when (操作):
        let result = ChatMessage::try_from(dto);

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), ValueObjectError::MessageContentEmpty);
    }
}
