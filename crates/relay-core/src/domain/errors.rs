//! Errors - dispatcher のエラー分類
//!
//! - `DispatchError`: dispatcher の呼び出し側に返る唯一の型
//! - `ConsumerError` / `TransactionError` / `ResolveError`: 各 port の失敗
//!
//! dispatcher 内部ではどれも回復しません。バッチを中断して呼び出し側に返します
//! （retry / dead-letter は transport 側の責務）。

use std::time::Duration;

use thiserror::Error;

use super::message::{CommandType, ConsumerType};

/// DispatchError は `init()` / `dispatch_message()` の失敗
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A command lists more than one consumer. Raised by `init()`.
    #[error("multiple consumers for one command: {}", join(.commands))]
    Configuration { commands: Vec<CommandType> },

    /// Pre-dispatch validation found an item nobody consumes.
    #[error("couldn't find consumer for {command_type} (item {index})")]
    UnresolvedConsumer {
        command_type: CommandType,
        index: usize,
    },

    #[error("failed to resolve consumer {consumer} for {command_type}: {source}")]
    Resolution {
        command_type: CommandType,
        consumer: ConsumerType,
        #[source]
        source: ResolveError,
    },

    #[error("consumer {consumer} failed on item {index} ({command_type}): {source}")]
    ConsumerInvocation {
        command_type: CommandType,
        consumer: ConsumerType,
        index: usize,
        #[source]
        source: ConsumerError,
    },

    #[error("transaction failed: {0}")]
    Transaction(#[from] TransactionError),
}

impl DispatchError {
    /// The command type the failure is attributed to, if any.
    pub fn command_type(&self) -> Option<&CommandType> {
        match self {
            Self::UnresolvedConsumer { command_type, .. }
            | Self::Resolution { command_type, .. }
            | Self::ConsumerInvocation { command_type, .. } => Some(command_type),
            Self::Configuration { .. } | Self::Transaction(_) => None,
        }
    }
}

/// ConsumerError は consumer 実装が返すエラー
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("payload decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("expected command {expected}, got {actual}")]
    UnexpectedCommand {
        expected: CommandType,
        actual: CommandType,
    },

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ConsumerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// TransactionError は transaction manager 側の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error("an ambient transaction is already active")]
    AlreadyActive,

    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// ResolveError は container が consumer を作れなかったとき
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no registration for consumer {0}")]
    NotRegistered(ConsumerType),
}

/// SendError は outbound transport の失敗
#[derive(Debug, Error)]
pub enum SendError {
    #[error("encode command {command_type}: {source}")]
    Encode {
        command_type: CommandType,
        #[source]
        source: serde_json::Error,
    },

    #[error("transport: {0}")]
    Transport(String),
}

fn join(types: &[CommandType]) -> String {
    types
        .iter()
        .map(CommandType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
