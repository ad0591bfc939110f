//! EnvelopeDedup - commit 済み envelope id のスライディングキャッシュ
//!
//! transport が同じ envelope を再配送してきたときに、二重処理を避けるための
//! 任意機能（デフォルト無効）。
//!
//! - 記録するのは commit に成功した id だけ（失敗したバッチは再配送で再試行できる）
//! - 容量を超えたら最も古く参照された id から忘れる（LRU）
//! - 同じ id の envelope が同時に 2 本 dispatch される競合は防がない

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::domain::EnvelopeId;

pub struct EnvelopeDedup {
    seen: Mutex<LruCache<EnvelopeId, ()>>,
}

impl EnvelopeDedup {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Was this envelope already committed? A hit refreshes its position.
    pub fn seen(&self, id: &EnvelopeId) -> bool {
        self.seen.lock().get(id).is_some()
    }

    pub fn remember(&self, id: EnvelopeId) {
        self.seen.lock().put(id, ());
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.seen.lock().cap()
    }
}

impl std::fmt::Debug for EnvelopeDedup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeDedup")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn remembers_committed_ids() {
        let dedup = EnvelopeDedup::new(cap(4));
        let id = EnvelopeId::generate();

        assert!(!dedup.seen(&id));
        dedup.remember(id);
        assert!(dedup.seen(&id));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn evicts_least_recently_seen() {
        let dedup = EnvelopeDedup::new(cap(2));
        let a = EnvelopeId::generate();
        let b = EnvelopeId::generate();
        let c = EnvelopeId::generate();

        dedup.remember(a);
        dedup.remember(b);
        // a を参照し直すので、次に追い出されるのは b
        assert!(dedup.seen(&a));
        dedup.remember(c);

        assert!(dedup.seen(&a));
        assert!(!dedup.seen(&b));
        assert!(dedup.seen(&c));
    }
}
