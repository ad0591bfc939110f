//! ConsumerRegistry - command_type → consumer_type のマッピング
//!
//! # 設計
//! - 起動時に `MessageDirectory` から構築（mutable）
//! - dispatch 中は読み取り専用（immutable）
//!
//! ロックは持ちません。`init()` が `&mut self` を要求するので、
//! dispatch と再初期化が同時に走ることはありません。

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::domain::{CommandType, ConsumerType, DispatchError, MessageDirectory, MessageInfo};

#[derive(Debug, Default, Clone)]
pub struct ConsumerRegistry {
    consumers: HashMap<CommandType, ConsumerType>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self {
            consumers: HashMap::new(),
        }
    }

    pub fn from_directory(directory: &MessageDirectory) -> Result<Self, DispatchError> {
        let mut registry = Self::new();
        registry.init(directory)?;
        Ok(registry)
    }

    /// (Re)build the mapping from scratch.
    ///
    /// Entries for the same message type are merged first, so a command
    /// listed twice with one consumer each is still a duplicate.
    /// Fails with `DispatchError::Configuration` if any command ends up with
    /// more than one consumer; in that case the previous mapping is left untouched.
    /// Every type with at least one consumer maps to its first-listed one.
    pub fn init(&mut self, directory: &MessageDirectory) -> Result<(), DispatchError> {
        let merged = merge_entries(directory.infos());
        ensure_single_consumer_merged(&merged)?;

        let consumers: HashMap<CommandType, ConsumerType> = merged
            .into_iter()
            .filter_map(|(message_type, entry)| {
                let first = entry.consumers.into_iter().next()?;
                Some((message_type, first))
            })
            .collect();

        debug!(commands = consumers.len(), "consumer registry initialized");
        self.consumers = consumers;
        Ok(())
    }

    pub fn consumer_for(&self, command_type: &CommandType) -> Option<&ConsumerType> {
        self.consumers.get(command_type)
    }

    pub fn contains(&self, command_type: &CommandType) -> bool {
        self.consumers.contains_key(command_type)
    }

    /// Registered command types, sorted.
    pub fn command_types(&self) -> Vec<CommandType> {
        let mut types: Vec<CommandType> = self.consumers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// Consumers of one message type, gathered from every directory entry.
#[derive(Debug, Default)]
struct MergedEntry {
    is_command: bool,
    /// Listing order, without repeats.
    consumers: Vec<ConsumerType>,
}

fn merge_entries(infos: &[MessageInfo]) -> BTreeMap<CommandType, MergedEntry> {
    let mut merged: BTreeMap<CommandType, MergedEntry> = BTreeMap::new();
    for info in infos {
        let entry = merged.entry(info.message_type.clone()).or_default();
        // 一度でも command として登録されていれば command 扱い
        entry.is_command |= info.is_command();
        for consumer in &info.all_consumers {
            if !entry.consumers.contains(consumer) {
                entry.consumers.push(consumer.clone());
            }
        }
    }
    merged
}

fn ensure_single_consumer_merged(
    merged: &BTreeMap<CommandType, MergedEntry>,
) -> Result<(), DispatchError> {
    let commands: Vec<CommandType> = merged
        .iter()
        .filter(|(_, entry)| entry.is_command && entry.consumers.len() > 1)
        .map(|(message_type, _)| message_type.clone())
        .collect();

    if commands.is_empty() {
        return Ok(());
    }
    Err(DispatchError::Configuration { commands })
}

/// Reject every command that ends up with more than one consumer, all at once.
/// The offending commands are reported sorted.
pub fn ensure_single_consumer(infos: &[MessageInfo]) -> Result<(), DispatchError> {
    ensure_single_consumer_merged(&merge_entries(infos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn directory() -> MessageDirectory {
        MessageDirectory::default()
            .with(MessageInfo::command("a.v1", "ConsumerA"))
            .with(MessageInfo::command("b.v1", "ConsumerB"))
    }

    #[test]
    fn init_maps_each_command_to_its_consumer() {
        let registry = ConsumerRegistry::from_directory(&directory()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.consumer_for(&CommandType::new("a.v1")),
            Some(&ConsumerType::new("ConsumerA"))
        );
        assert!(registry.consumer_for(&CommandType::new("missing.v1")).is_none());
    }

    #[test]
    fn command_with_two_consumers_is_a_configuration_error() {
        let directory = directory()
            .with(MessageInfo::command("dup.v1", "First").also("Second"))
            .with(MessageInfo::command("also-dup.v1", "X").also("Y").also("Z"));

        let err = ConsumerRegistry::from_directory(&directory).unwrap_err();
        match err {
            DispatchError::Configuration { commands } => {
                assert_eq!(
                    commands,
                    vec![CommandType::new("also-dup.v1"), CommandType::new("dup.v1")]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn query_with_many_consumers_maps_to_first() {
        let directory = MessageDirectory::default()
            .with(MessageInfo::query("q.v1", ["First", "Second"]));

        let registry = ConsumerRegistry::from_directory(&directory).unwrap();
        assert_eq!(
            registry.consumer_for(&CommandType::new("q.v1")),
            Some(&ConsumerType::new("First"))
        );
    }

    #[test]
    fn entries_without_consumers_are_skipped() {
        let directory = MessageDirectory::default().with(MessageInfo::query(
            "orphan.v1",
            Vec::<ConsumerType>::new(),
        ));

        let registry = ConsumerRegistry::from_directory(&directory).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn init_twice_replaces_mapping() {
        let mut registry = ConsumerRegistry::from_directory(&directory()).unwrap();

        let next = MessageDirectory::default().with(MessageInfo::command("c.v1", "ConsumerC"));
        registry.init(&next).unwrap();

        assert_eq!(registry.command_types(), vec![CommandType::new("c.v1")]);
    }

    #[test]
    fn failed_reinit_keeps_previous_mapping() {
        let mut registry = ConsumerRegistry::from_directory(&directory()).unwrap();

        let bad = MessageDirectory::default().with(MessageInfo::command("c.v1", "X").also("Y"));
        assert!(registry.init(&bad).is_err());

        assert_eq!(
            registry.command_types(),
            vec![CommandType::new("a.v1"), CommandType::new("b.v1")]
        );
    }

    #[test]
    fn command_split_across_entries_is_a_configuration_error() {
        let directory = directory()
            .with(MessageInfo::command("dup.v1", "First"))
            .with(MessageInfo::command("dup.v1", "Second"));

        let err = ConsumerRegistry::from_directory(&directory).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Configuration { ref commands } if commands == &vec![CommandType::new("dup.v1")]
        ));
    }

    #[test]
    fn query_split_across_entries_keeps_first_listed() {
        let directory = MessageDirectory::default()
            .with(MessageInfo::query("q.v1", ["First"]))
            .with(MessageInfo::query("q.v1", ["Second"]));

        let registry = ConsumerRegistry::from_directory(&directory).unwrap();
        assert_eq!(
            registry.consumer_for(&CommandType::new("q.v1")),
            Some(&ConsumerType::new("First"))
        );
    }

    #[rstest]
    #[case::single_command(vec![MessageInfo::command("a.v1", "A")], true)]
    #[case::duplicate_command(vec![MessageInfo::command("a.v1", "A").also("B")], false)]
    #[case::duplicate_query(vec![MessageInfo::query("a.v1", ["A", "B"])], true)]
    #[case::same_consumer_listed_twice(
        vec![MessageInfo::command("a.v1", "A"), MessageInfo::command("a.v1", "A")],
        true
    )]
    #[case::command_and_query_entries(
        vec![MessageInfo::query("a.v1", ["A"]), MessageInfo::command("a.v1", "B")],
        false
    )]
    #[case::empty(vec![], true)]
    fn single_consumer_check(#[case] infos: Vec<MessageInfo>, #[case] ok: bool) {
        assert_eq!(ensure_single_consumer(&infos).is_ok(), ok);
    }
}
