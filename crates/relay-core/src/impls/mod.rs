//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryContainer**: consumer_type → ファクトリの Container
//! - **InMemoryTransactionManager / InMemoryStore**: staging 付きの KV ストア
//! - **InMemorySender**: 送信した envelope を記録する MessageSender
//!
//! 本番ではホスト側が DI container と transaction manager を実装します。

pub mod inmem_container;
pub mod inmem_sender;
pub mod inmem_transaction;

pub use self::inmem_container::{InMemoryContainer, InMemoryContainerBuilder, ScopeEvent};
pub use self::inmem_sender::InMemorySender;
pub use self::inmem_transaction::{
    InMemoryStore, InMemoryTransactionManager, TransactionCounters, TransactionId,
};
