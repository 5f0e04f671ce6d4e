//! Domain factories for creating domain entities and value objects.

use super::value_object::MessageId;

/// Factory for generating MessageId instances.
///
/// Encapsulates the generation concern, keeping MessageId itself a plain
/// value wrapper.
pub struct MessageIdFactory;

impl MessageIdFactory {
    /// Generate a new MessageId from a random UUID v4.
    pub fn generate() -> MessageId {
        MessageId::from_uuid(uuid::Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_factory_generate_uniqueness() {
        // テスト項目: MessageIdFactory::generate() は毎回異なる ID を生成する
        // when (操作):
        let id1 = MessageIdFactory::generate();
        let id2 = MessageIdFactory::generate();

        // then (期待する結果):
        assert_ne!(id1, id2);
    }
}
