//! relay-core
//!
//! コマンドのバッチを、1 つのトランザクション境界の中で
//! コマンドごとに唯一の consumer へ配送する dispatcher。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, envelope, directory, errors）
//! - **ports**: 抽象化レイヤー（Consumer, Container, TransactionManager, MessageSender）
//! - **app**: アプリケーションロジック（registry, policy, dispatcher, builder, config）
//! - **typed**: 型付き Command API（Command trait, Consume trait, TypedConsumer）
//! - **impls**: 実装（InMemoryContainer, InMemoryTransactionManager など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{CommandBatchDispatcher, DispatcherBuilder, DispatcherConfig, TransactionPolicy};
pub use domain::{CommandType, ConsumerType, DispatchError, ImmutableEnvelope, MessageItem};
pub use ports::SingleThreadMessageDispatcher;
