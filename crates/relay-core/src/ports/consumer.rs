//! Consumer port - dispatcher が呼び出す唯一の契約
//!
//! 型付きの consumer は `typed::Consume<C>` を実装し、`TypedConsumer` で
//! この object-safe な trait に変換します。

use async_trait::async_trait;

use crate::domain::{ConsumerError, ImmutableEnvelope, MessageItem};

/// Consumer handles one item of an envelope.
///
/// The whole envelope is passed along so the consumer can read batch-level
/// metadata (attributes, id, sibling count).
#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(
        &self,
        item: &MessageItem,
        envelope: &ImmutableEnvelope,
    ) -> Result<(), ConsumerError>;
}
