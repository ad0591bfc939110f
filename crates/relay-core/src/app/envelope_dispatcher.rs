//! EnvelopeDispatcher - 1 envelope 分の resolve → consume ループ
//!
//! # スコープの入れ子
//! ```text
//! [transaction boundary]            ← CommandBatchDispatcher が保持
//!   └─ scope(MessageEnvelope)       ← バッチ全体で共有
//!        ├─ scope(MessageItem) #0   ← item ごとに開いて閉じる
//!        ├─ scope(MessageItem) #1
//!        └─ ...
//! ```
//! スコープはすべて guard（`Box<dyn LifetimeScope>`）で、drop 順は LIFO。
//! `?` で抜けた場合も同じ順に解放されます。

use tracing::debug;

use super::registry::ConsumerRegistry;
use crate::domain::{DispatchError, ImmutableEnvelope, MessageItem};
use crate::ports::{Container, LifetimeScope, ScopeTag};

pub struct EnvelopeDispatcher<'a> {
    container: &'a dyn Container,
    registry: &'a ConsumerRegistry,
}

impl<'a> EnvelopeDispatcher<'a> {
    pub fn new(container: &'a dyn Container, registry: &'a ConsumerRegistry) -> Self {
        Self {
            container,
            registry,
        }
    }

    /// Dispatch every item, in order, one at a time.
    ///
    /// Stops at the first failing item; later items are never resolved.
    pub async fn dispatch_envelope(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError> {
        let unit = self.container.begin_scope(ScopeTag::MessageEnvelope);

        for item in envelope.items() {
            // 同じ unit の中で dispatch する = 同じトランザクション
            let scope = unit.begin_scope(ScopeTag::MessageItem);
            self.dispatch_item(scope.as_ref(), item, envelope).await?;
        }

        Ok(())
    }

    async fn dispatch_item(
        &self,
        scope: &dyn LifetimeScope,
        item: &MessageItem,
        envelope: &ImmutableEnvelope,
    ) -> Result<(), DispatchError> {
        let command_type = item.command_type();
        let consumer_type = self.registry.consumer_for(command_type).ok_or_else(|| {
            DispatchError::UnresolvedConsumer {
                command_type: command_type.clone(),
                index: item.index(),
            }
        })?;

        let consumer = scope
            .resolve(consumer_type)
            .map_err(|source| DispatchError::Resolution {
                command_type: command_type.clone(),
                consumer: consumer_type.clone(),
                source,
            })?;

        debug!(
            envelope_id = %envelope.id(),
            index = item.index(),
            command_type = %command_type,
            consumer = %consumer_type,
            "consuming item"
        );

        consumer
            .consume(item, envelope)
            .await
            .map_err(|source| DispatchError::ConsumerInvocation {
                command_type: command_type.clone(),
                consumer: consumer_type.clone(),
                index: item.index(),
                source,
            })
    }
}
