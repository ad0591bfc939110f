//! Ambient - 実行コンテキストごとの「現在のトランザクション」
//!
//! `fork()` で包んだ future の中だけで有効なスロットです。
//! 子コンテキストは親の値を引き継ぎ、中での変更は親や兄弟に漏れません。
//! dispatcher は envelope ごとに `fork()` するので、並行する envelope
//! （別タスクでも、同じタスク内の `join!` でも）が互いのトランザクションを見ることはありません。
//!
//! `tokio::spawn` した先には引き継がれません。

use std::cell::Cell;
use std::future::Future;

/// Transaction identifier as seen by the ambient slot. Unique per process.
pub type AmbientId = u64;

tokio::task_local! {
    static AMBIENT: Cell<Option<AmbientId>>;
}

/// Run `future` in a child context that starts with the caller's ambient transaction.
pub async fn fork<F: Future>(future: F) -> F::Output {
    AMBIENT.scope(Cell::new(current()), future).await
}

/// Whether the caller runs inside some `fork()`.
pub fn in_context() -> bool {
    AMBIENT.try_with(|_| ()).is_ok()
}

/// `None` outside any context.
pub fn current() -> Option<AmbientId> {
    AMBIENT.try_with(Cell::get).ok().flatten()
}

/// No-op outside a context.
pub fn set(id: Option<AmbientId>) {
    let _ = AMBIENT.try_with(|slot| slot.set(id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_a_context_nothing_is_ambient() {
        set(Some(1));
        assert!(!in_context());
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn child_inherits_but_does_not_leak() {
        fork(async {
            set(Some(7));
            fork(async {
                assert_eq!(current(), Some(7));
                set(Some(8));
            })
            .await;
            assert_eq!(current(), Some(7));
        })
        .await;
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn sibling_contexts_are_isolated() {
        let (a, b) = tokio::join!(
            fork(async {
                set(Some(1));
                tokio::task::yield_now().await;
                current()
            }),
            fork(async {
                set(Some(2));
                tokio::task::yield_now().await;
                current()
            })
        );
        assert_eq!((a, b), (Some(1), Some(2)));
    }
}
