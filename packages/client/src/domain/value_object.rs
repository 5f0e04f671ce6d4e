//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity. Every inbound payload
//! is coerced through these constructors before the rest of the client sees
//! it, so validation lives here and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ValueObjectError;

/// Conversation identifier value object.
///
/// Identifies one conversation room on the message server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a new ConversationId.
    ///
    /// # Arguments
    ///
    /// * `id` - The conversation identifier string
    ///
    /// # Returns
    ///
    /// A Result containing the ConversationId or an error if validation fails
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.is_empty() {
            return Err(ValueObjectError::ConversationIdEmpty);
        }
        let len = id.len();
        if len > 100 {
            return Err(ValueObjectError::ConversationIdTooLong {
                max: 100,
                actual: len,
            });
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ValueObjectError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sender identifier value object.
///
/// Identifies the member a message originates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(String);

impl SenderId {
    /// Create a new SenderId.
    ///
    /// # Arguments
    ///
    /// * `id` - The sender identifier string
    ///
    /// # Returns
    ///
    /// A Result containing the SenderId or an error if validation fails
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.is_empty() {
            return Err(ValueObjectError::SenderIdEmpty);
        }
        let len = id.len();
        if len > 100 {
            return Err(ValueObjectError::SenderIdTooLong {
                max: 100,
                actual: len,
            });
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SenderId {
    type Error = ValueObjectError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message content value object.
///
/// Represents the content of a chat message with validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent(String);

impl MessageContent {
    /// Create a new MessageContent.
    ///
    /// # Arguments
    ///
    /// * `content` - The message content string
    ///
    /// # Returns
    ///
    /// A Result containing the MessageContent or an error if validation fails
    pub fn new(content: String) -> Result<Self, ValueObjectError> {
        if content.is_empty() {
            return Err(ValueObjectError::MessageContentEmpty);
        }
        let len = content.len();
        if len > 10000 {
            return Err(ValueObjectError::MessageContentTooLong {
                max: 10000,
                actual: len,
            });
        }
        Ok(Self(content))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(content: String) -> Result<Self, Self::Error> {
        Self::new(content)
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bearer credential value object.
///
/// The opaque token presented during the connection handshake. The client
/// never inspects it; the Display impl is intentionally absent so the raw
/// credential does not end up in log output by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Create a new AuthToken.
    ///
    /// # Arguments
    ///
    /// * `token` - The bearer credential string
    ///
    /// # Returns
    ///
    /// A Result containing the AuthToken or an error if validation fails
    pub fn new(token: String) -> Result<Self, ValueObjectError> {
        if token.is_empty() {
            return Err(ValueObjectError::AuthTokenEmpty);
        }
        let len = token.len();
        if len > 4096 {
            return Err(ValueObjectError::AuthTokenTooLong {
                max: 4096,
                actual: len,
            });
        }
        Ok(Self(token))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AuthToken {
    type Error = ValueObjectError;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Self::new(token)
    }
}

/// Local message identifier.
///
/// Generated on the client when a message is queued optimistically, and used
/// to correlate later delivery-state updates with the original send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    /// Wrap an existing UUID as a MessageId.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value.
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
