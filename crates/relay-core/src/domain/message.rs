use serde::{Deserialize, Serialize};
use std::fmt;

/// CommandType はメッセージの論理型（registry のキー）
///
/// # 命名規約
/// - `{namespace}.{domain}.{action}.v{major}`
/// - 例: `ledger.deposit.v1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandType(String);

impl CommandType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CommandType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CommandType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// ConsumerType は container から consumer を resolve するための識別子
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerType(String);

impl ConsumerType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConsumerType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConsumerType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One command inside an envelope: mapped type + payload (+ position).
///
/// Fields are private; an item is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    /// Reassigned by the envelope on deserialize.
    #[serde(default)]
    index: usize,
    #[serde(rename = "type")]
    command_type: CommandType,
    payload: serde_json::Value,
}

impl MessageItem {
    pub fn new(index: usize, command_type: CommandType, payload: serde_json::Value) -> Self {
        Self {
            index,
            command_type,
            payload,
        }
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Position of this item within its envelope (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn command_type(&self) -> &CommandType {
        &self.command_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
