//! Container port - consumer インスタンスの解決
//!
//! dispatcher は container の中身を見ません。使うのは次の 2 つだけ:
//! - `begin_scope(tag)`: 入れ子のスコープを開く
//! - `resolve(consumer_type)`: スコープから consumer を取り出す
//!
//! スコープは RAII。`Box<dyn LifetimeScope>` を drop した時点で、
//! そのスコープで作られたインスタンスは解放されます。

use std::fmt;
use std::sync::Arc;

use super::consumer::Consumer;
use crate::domain::{ConsumerType, ResolveError};

/// Tag of a lifetime scope opened by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    /// One per envelope; shared by all items of the batch.
    MessageEnvelope,
    /// One per item, nested inside the envelope scope.
    MessageItem,
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageEnvelope => f.write_str("message-envelope"),
            Self::MessageItem => f.write_str("message-item"),
        }
    }
}

/// Root of the resolution container.
pub trait Container: Send + Sync {
    fn begin_scope(&self, tag: ScopeTag) -> Box<dyn LifetimeScope>;
}

/// A nested resolution scope. Dropping it releases everything it resolved.
pub trait LifetimeScope: Send + Sync {
    fn tag(&self) -> ScopeTag;

    fn begin_scope(&self, tag: ScopeTag) -> Box<dyn LifetimeScope>;

    fn resolve(&self, consumer: &ConsumerType) -> Result<Arc<dyn Consumer>, ResolveError>;
}
