//! App - アプリケーション層
//!
//! ports を組み合わせて dispatcher を実装します。
//!
//! # 主要コンポーネント
//! - **ConsumerRegistry**: command → consumer の検証済みマッピング
//! - **TransactionPolicy**: トランザクション境界のファクトリ
//! - **EnvelopeDispatcher**: スコープを入れ子にして item を順に consume
//! - **CommandBatchDispatcher**: 検証 → 境界 → 委譲 → commit / rollback
//! - **DispatcherBuilder / DispatcherConfig**: 起動時のワイヤリング
//! - **CommandSender**: outbound のパススルー

pub mod batch_dispatcher;
pub mod builder;
pub mod config;
pub mod dedup;
pub mod envelope_dispatcher;
pub mod policy;
pub mod registry;
pub mod sender;

pub use self::batch_dispatcher::CommandBatchDispatcher;
pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::config::{ConfigError, DedupConfig, DispatcherConfig, TransactionConfig, TransactionMode};
pub use self::dedup::EnvelopeDedup;
pub use self::envelope_dispatcher::EnvelopeDispatcher;
pub use self::policy::{DEFAULT_TIMEOUT, NoopBoundary, PolicyKind, TransactionPolicy, TransactionSettings};
pub use self::registry::ConsumerRegistry;
pub use self::sender::CommandSender;
