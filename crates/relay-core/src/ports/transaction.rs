//! Transaction port - トランザクション境界の抽象化
//!
//! # 契約
//! - `TransactionManager::begin()` が境界（`TransactionBoundary`）を返す
//! - `complete()` で commit
//! - `complete()` を呼ばずに drop されたら rollback（Drop 実装の責務）
//!
//! 具体的な transaction manager の API には依存しません。ホスト側が実装します。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TransactionError;

/// How a new boundary relates to an already ambient transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeOption {
    /// Join the ambient transaction, or start one.
    Required,
    /// Always start a fresh transaction.
    RequiresNew,
    /// Run without any ambient transaction.
    Suppress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    Serializable,
    RepeatableRead,
    ReadCommitted,
    ReadUncommitted,
    Snapshot,
    Chaos,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Serializable => "serializable",
            Self::RepeatableRead => "repeatable_read",
            Self::ReadCommitted => "read_committed",
            Self::ReadUncommitted => "read_uncommitted",
            Self::Snapshot => "snapshot",
            Self::Chaos => "chaos",
        };
        f.write_str(s)
    }
}

/// Options handed to the manager when a boundary is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: IsolationLevel,
    /// `None` means unbounded.
    pub timeout: Option<Duration>,
}

/// TransactionBoundary は 1 バッチ分の原子性の単位
#[async_trait]
pub trait TransactionBoundary: Send {
    /// Mark the boundary complete and commit.
    async fn complete(self: Box<Self>) -> Result<(), TransactionError>;
}

/// TransactionManager はホスト環境が提供する
pub trait TransactionManager: Send + Sync {
    fn begin(
        &self,
        option: ScopeOption,
        options: TransactionOptions,
    ) -> Result<Box<dyn TransactionBoundary>, TransactionError>;
}
