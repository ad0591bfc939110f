//! Ports - 抽象化レイヤー
//!
//! dispatcher が外部コラボレータ（DI container, transaction manager,
//! outbound transport）と話すための trait を定義します。
//! 開発・テスト用の実装は `impls` にあります。

pub mod ambient;
pub mod consumer;
pub mod container;
pub mod dispatch;
pub mod sender;
pub mod transaction;

pub use self::consumer::Consumer;
pub use self::container::{Container, LifetimeScope, ScopeTag};
pub use self::dispatch::SingleThreadMessageDispatcher;
pub use self::sender::MessageSender;
pub use self::transaction::{
    IsolationLevel, ScopeOption, TransactionBoundary, TransactionManager, TransactionOptions,
};
