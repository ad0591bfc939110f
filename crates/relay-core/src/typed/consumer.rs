//! Consume trait - 型付き consumer の定義
//!
//! # 二層構造
//! - **表層（Typed）**: `Consume<C>` - payload はデコード済みの `C` で届く
//! - **内部（Dyn）**: `ports::Consumer` - object-safe, container に登録される形
//!
//! `TypedConsumer<C, H>` が両者をつなぐ（type erasure）。

use std::marker::PhantomData;

use async_trait::async_trait;

use super::command::Command;
use crate::domain::{CommandType, ConsumerError, ImmutableEnvelope, MessageItem};
use crate::ports::Consumer;

/// Consume は Command `C` を処理する
///
/// # 使用例
/// ```ignore
/// struct DepositConsumer { store: Arc<InMemoryStore> }
///
/// #[async_trait]
/// impl Consume<Deposit> for DepositConsumer {
///     async fn consume(&self, cmd: Deposit, _envelope: &ImmutableEnvelope) -> Result<(), ConsumerError> {
///         self.store.put(&cmd.account, json!(cmd.amount));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Consume<C: Command>: Send + Sync {
    async fn consume(&self, command: C, envelope: &ImmutableEnvelope) -> Result<(), ConsumerError>;
}

pub struct TypedConsumer<C: Command, H: Consume<C>> {
    consumer: H,
    _marker: PhantomData<C>,
}

impl<C: Command, H: Consume<C>> TypedConsumer<C, H> {
    pub fn new(consumer: H) -> Self {
        Self {
            consumer,
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &H {
        &self.consumer
    }
}

#[async_trait]
impl<C: Command, H: Consume<C>> Consumer for TypedConsumer<C, H> {
    async fn consume(
        &self,
        item: &MessageItem,
        envelope: &ImmutableEnvelope,
    ) -> Result<(), ConsumerError> {
        // registry の設定ミスで別の型が流れてきた場合、デコードが偶然通っても弾く
        if item.command_type().as_str() != C::TYPE {
            return Err(ConsumerError::UnexpectedCommand {
                expected: CommandType::new(C::TYPE),
                actual: item.command_type().clone(),
            });
        }

        let command: C = serde_json::from_value(item.payload().clone())?;
        self.consumer.consume(command, envelope).await
    }
}
