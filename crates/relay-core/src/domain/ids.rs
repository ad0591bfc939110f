//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID + Phantom type パターン。
//! `EnvelopeId` は時刻でソート可能なので、dedup キャッシュやログの突き合わせに
//! そのまま使えます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"env-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData なので実行時のサイズは `Ulid` と同じ（16 bytes）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 新しい ID を現在時刻で生成
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Envelope のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Envelope {}

impl IdMarker for Envelope {
    fn prefix() -> &'static str {
        "env-"
    }
}

/// Identifier of an envelope (one delivered batch).
pub type EnvelopeId = Id<Envelope>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_id_display_has_prefix() {
        let ulid = Ulid::new();
        let id = EnvelopeId::from_ulid(ulid);

        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("env-{ulid}"));
    }

    #[test]
    fn envelope_ids_are_sortable() {
        let id1 = EnvelopeId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = EnvelopeId::generate();

        assert!(id1 < id2);
    }

    #[test]
    fn envelope_id_serializes_as_plain_ulid() {
        let ulid = Ulid::new();
        let id = EnvelopeId::from_ulid(ulid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));

        let back: EnvelopeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<EnvelopeId>(), std::mem::size_of::<Ulid>());
    }
}
