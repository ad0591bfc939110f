//! MessageDirectory - メッセージ型と consumer 候補の一覧
//!
//! 起動時に外部（スキャナや手書きの設定）が組み立て、dispatcher は読むだけ。

use serde::{Deserialize, Serialize};

use super::message::{CommandType, ConsumerType};

/// Command は consumer が 1 つだけ、Query は複数を許す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Command,
    Query,
}

/// One directory entry: a message type and every consumer that can handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub message_type: CommandType,
    pub kind: MessageKind,
    pub all_consumers: Vec<ConsumerType>,
}

impl MessageInfo {
    pub fn command(message_type: impl Into<CommandType>, consumer: impl Into<ConsumerType>) -> Self {
        Self {
            message_type: message_type.into(),
            kind: MessageKind::Command,
            all_consumers: vec![consumer.into()],
        }
    }

    pub fn query<I, C>(message_type: impl Into<CommandType>, consumers: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConsumerType>,
    {
        Self {
            message_type: message_type.into(),
            kind: MessageKind::Query,
            all_consumers: consumers.into_iter().map(Into::into).collect(),
        }
    }

    /// Add another candidate consumer (kept in listing order).
    pub fn also(mut self, consumer: impl Into<ConsumerType>) -> Self {
        self.all_consumers.push(consumer.into());
        self
    }

    pub fn is_command(&self) -> bool {
        self.kind == MessageKind::Command
    }
}

/// MessageDirectory は MessageInfo の並び
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDirectory {
    infos: Vec<MessageInfo>,
}

impl MessageDirectory {
    pub fn new(infos: Vec<MessageInfo>) -> Self {
        Self { infos }
    }

    pub fn with(mut self, info: MessageInfo) -> Self {
        self.infos.push(info);
        self
    }

    pub fn infos(&self) -> &[MessageInfo] {
        &self.infos
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl FromIterator<MessageInfo> for MessageDirectory {
    fn from_iter<I: IntoIterator<Item = MessageInfo>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_and_query_constructors() {
        let cmd = MessageInfo::command("a.v1", "ConsumerA");
        assert!(cmd.is_command());
        assert_eq!(cmd.all_consumers, vec![ConsumerType::new("ConsumerA")]);

        let query = MessageInfo::query("q.v1", ["First", "Second"]);
        assert!(!query.is_command());
        assert_eq!(query.all_consumers.len(), 2);
    }

    #[test]
    fn directory_collects_infos_in_order() {
        let directory: MessageDirectory = vec![
            MessageInfo::command("a.v1", "A"),
            MessageInfo::command("b.v1", "B"),
        ]
        .into_iter()
        .collect();

        let types: Vec<&str> = directory
            .infos()
            .iter()
            .map(|i| i.message_type.as_str())
            .collect();
        assert_eq!(types, vec!["a.v1", "b.v1"]);
    }
}
