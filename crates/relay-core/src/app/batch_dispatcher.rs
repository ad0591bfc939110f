//! CommandBatchDispatcher - コマンドのバッチを単一 consumer に配送する
//!
//! # フロー
//! 1. 空の envelope → 何もしない（トランザクションも開かない）
//! 2. 全 item の consumer が登録済みか検証（1 つでも欠けたら、どの consumer も呼ばずに失敗）
//! 3. 新しい ambient コンテキスト（`ports::ambient::fork`）の中で `TransactionPolicy` から境界を開く
//! 4. `EnvelopeDispatcher` に委譲
//! 5. 成功 → `complete()` で commit / 失敗 → 境界を drop して rollback、エラーを返す
//!
//! # Fail-fast 設計
//! 「途中まで処理してから consumer が見つからない」は起こりません。
//! 検証はバッチ全体に対して、最初の consumer 呼び出しより前に行います。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::dedup::EnvelopeDedup;
use super::envelope_dispatcher::EnvelopeDispatcher;
use super::policy::{TransactionPolicy, TransactionSettings};
use super::registry::ConsumerRegistry;
use crate::domain::{DispatchError, ImmutableEnvelope, MessageDirectory, TransactionError};
use crate::ports::{
    Container, ScopeOption, SingleThreadMessageDispatcher, TransactionBoundary, TransactionManager,
    ambient,
};

pub struct CommandBatchDispatcher {
    container: Arc<dyn Container>,
    directory: Arc<MessageDirectory>,
    transactions: Arc<dyn TransactionManager>,
    registry: ConsumerRegistry,
    policy: TransactionPolicy,
    dedup: Option<EnvelopeDedup>,
}

impl CommandBatchDispatcher {
    /// New dispatcher with the default `RequiresNew` policy. Call `init()` before dispatching.
    pub fn new(
        container: Arc<dyn Container>,
        directory: Arc<MessageDirectory>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        let policy = TransactionPolicy::requires_new(Arc::clone(&transactions));
        Self {
            container,
            directory,
            transactions,
            registry: ConsumerRegistry::new(),
            policy,
            dedup: None,
        }
    }

    pub fn no_transactions(&mut self) {
        self.policy = TransactionPolicy::no_transactions();
    }

    pub fn transactional<F>(&mut self, factory: F)
    where
        F: Fn() -> Result<Box<dyn TransactionBoundary>, TransactionError> + Send + Sync + 'static,
    {
        self.policy = TransactionPolicy::custom(factory);
    }

    /// Managed policy on this dispatcher's transaction manager.
    pub fn transactional_with(&mut self, option: ScopeOption, settings: TransactionSettings) {
        self.policy = TransactionPolicy::managed(Arc::clone(&self.transactions), option, settings);
    }

    pub fn set_policy(&mut self, policy: TransactionPolicy) {
        self.policy = policy;
    }

    pub fn enable_dedup(&mut self, dedup: EnvelopeDedup) {
        self.dedup = Some(dedup);
    }

    pub fn policy(&self) -> &TransactionPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &ConsumerRegistry {
        &self.registry
    }

    pub fn dedup(&self) -> Option<&EnvelopeDedup> {
        self.dedup.as_ref()
    }

    /// Run the per-item loop without opening a transaction boundary.
    pub async fn dispatch_envelope(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError> {
        EnvelopeDispatcher::new(self.container.as_ref(), &self.registry)
            .dispatch_envelope(envelope)
            .await
    }

    /// Open the policy's boundary, run the items, then commit or roll back.
    async fn dispatch_in_transaction(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError> {
        let boundary = self.policy.open()?;

        if let Err(err) = self.dispatch_envelope(envelope).await {
            // complete() せずに drop = rollback
            drop(boundary);
            warn!(
                envelope_id = %envelope.id(),
                error = %err,
                "envelope failed, transaction discarded"
            );
            return Err(err);
        }

        if let Err(err) = boundary.complete().await {
            warn!(envelope_id = %envelope.id(), error = %err, "commit failed");
            return Err(err.into());
        }
        if let Some(dedup) = &self.dedup {
            dedup.remember(envelope.id());
        }
        info!(
            envelope_id = %envelope.id(),
            items = envelope.len(),
            "envelope dispatched"
        );
        Ok(())
    }

    /// Every item must have a consumer before anything runs.
    fn ensure_consumers(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError> {
        match envelope
            .items()
            .iter()
            .find(|item| !self.registry.contains(item.command_type()))
        {
            Some(item) => Err(DispatchError::UnresolvedConsumer {
                command_type: item.command_type().clone(),
                index: item.index(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SingleThreadMessageDispatcher for CommandBatchDispatcher {
    fn init(&mut self) -> Result<(), DispatchError> {
        self.registry.init(&self.directory)
    }

    async fn dispatch_message(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError> {
        if envelope.is_empty() {
            debug!(envelope_id = %envelope.id(), "empty envelope, nothing to dispatch");
            return Ok(());
        }

        if let Some(dedup) = &self.dedup
            && dedup.seen(&envelope.id())
        {
            info!(envelope_id = %envelope.id(), "envelope already committed, skipping");
            return Ok(());
        }

        if let Err(err) = self.ensure_consumers(envelope) {
            warn!(envelope_id = %envelope.id(), error = %err, "rejecting envelope");
            return Err(err);
        }

        // envelope ごとに ambient コンテキストを分ける（並行 dispatch 同士を混ぜない）
        ambient::fork(self.dispatch_in_transaction(envelope)).await
    }
}
