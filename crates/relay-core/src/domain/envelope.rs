//! ImmutableEnvelope - transport が届けるコマンドのバッチ
//!
//! Envelope は上流（transport）で作られ、dispatcher 側では読み取り専用。
//! 変更 API は持たず、組み立ては `EnvelopeBuilder` で行います。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EnvelopeId;
use super::message::{CommandType, MessageItem};
use crate::typed::DynCommand;

/// Ordered, immutable batch of command messages.
///
/// Item indexes are positions: on deserialize they are renumbered from 0,
/// whatever the sender put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EnvelopeWire")]
pub struct ImmutableEnvelope {
    id: EnvelopeId,
    created_at: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
    items: Vec<MessageItem>,
}

impl ImmutableEnvelope {
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new()
    }

    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn items(&self) -> &[MessageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Deserialize)]
struct EnvelopeWire {
    id: EnvelopeId,
    created_at: DateTime<Utc>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    items: Vec<MessageItem>,
}

impl From<EnvelopeWire> for ImmutableEnvelope {
    fn from(wire: EnvelopeWire) -> Self {
        let items = wire
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.at(index))
            .collect();

        Self {
            id: wire.id,
            created_at: wire.created_at,
            attributes: wire.attributes,
            items,
        }
    }
}

/// EnvelopeBuilder は ImmutableEnvelope を組み立てる
///
/// # 使用例
/// ```ignore
/// let envelope = ImmutableEnvelope::builder()
///     .attribute("origin", "billing")
///     .item("ledger.deposit.v1", json!({ "account": "a", "amount": 10 }))
///     .build();
/// ```
///
/// item の index は追加順に 0 から振られます。
#[derive(Debug, Default)]
pub struct EnvelopeBuilder {
    id: Option<EnvelopeId>,
    created_at: Option<DateTime<Utc>>,
    attributes: BTreeMap<String, String>,
    items: Vec<(CommandType, serde_json::Value)>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an upstream id (e.g. a redelivered message) instead of generating one.
    pub fn id(mut self, id: EnvelopeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn item(mut self, command_type: impl Into<CommandType>, payload: serde_json::Value) -> Self {
        self.items.push((command_type.into(), payload));
        self
    }

    /// Serialize a typed command into the next item.
    pub fn command(self, command: &dyn DynCommand) -> Result<Self, serde_json::Error> {
        let payload = command.to_payload()?;
        Ok(self.item(command.command_type(), payload))
    }

    pub fn build(self) -> ImmutableEnvelope {
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, (command_type, payload))| MessageItem::new(index, command_type, payload))
            .collect();

        ImmutableEnvelope {
            id: self.id.unwrap_or_else(EnvelopeId::generate),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            attributes: self.attributes,
            items,
        }
    }
}
