//! Outbox of optimistic messages awaiting server confirmation.
//!
//! ## 役割
//!
//! 送信呼び出しはサーバの ACK を待たずに解決するため、送信済みメッセージは
//! ここに Pending として積まれます。同じ会話 ID と内容を持つサーバイベントが
//! 届けば確定（Confirmed）、期限内に届かなければ失敗（Failed）として
//! 通知されます。どちらかに必ず収束させることがこのモジュールの責務です。

use tokio::time::Instant;

use std::time::Duration;

use crate::domain::{ChatMessage, ConversationId, MessageContent, MessageId};

struct PendingEntry {
    message: ChatMessage,
    queued_at: Instant,
}

/// FIFO store of unconfirmed outgoing messages.
pub(crate) struct Outbox {
    pending: Vec<PendingEntry>,
    timeout: Duration,
}

impl Outbox {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            timeout,
        }
    }

    /// Queue an optimistic message at the given instant.
    pub(crate) fn push(&mut self, message: ChatMessage, queued_at: Instant) {
        self.pending.push(PendingEntry { message, queued_at });
    }

    /// Reconcile an inbound server message against the queue.
    ///
    /// Matches on conversation and content only (the server stamps its own
    /// sender and timestamp). The oldest matching entry wins; it is removed
    /// and its local id returned so a Confirmed update can be fanned out.
    pub(crate) fn confirm(
        &mut self,
        conversation_id: &ConversationId,
        content: &MessageContent,
    ) -> Option<MessageId> {
        let position = self.pending.iter().position(|entry| {
            entry.message.conversation_id == *conversation_id && entry.message.content == *content
        })?;
        let entry = self.pending.remove(position);
        Some(entry.message.id)
    }

    /// Remove every entry older than the reconciliation window.
    ///
    /// Returns the local ids of the expired messages; each is reported
    /// Failed exactly once.
    pub(crate) fn expire(&mut self, now: Instant) -> Vec<MessageId> {
        let timeout = self.timeout;
        let mut expired = Vec::new();
        self.pending.retain(|entry| {
            if now.duration_since(entry.queued_at) >= timeout {
                expired.push(entry.message.id);
                false
            } else {
                true
            }
        });
        expired
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
