//! InMemoryTransactionManager / InMemoryStore - 開発・テスト用のトランザクション
//!
//! # InMemoryStore
//! - key → JSON value のストア
//! - 開いているトランザクションごとに書き込みを staging し、commit で反映、rollback で破棄
//! - どのトランザクションに書くかは ambient スロット（`ports::ambient`）で決まる
//! - ambient がなければ書き込みは即時反映
//!
//! ambient は実行コンテキストごとなので、dispatcher が並行に流す envelope は
//! 同じストアでも別々のトランザクションになります。
//! `ambient::fork()` の外（テストから直接 `begin()` する場合など）では
//! ストア自身が持つ 1 つのスロットを使います。
//!
//! # ScopeOption の扱い
//! - `RequiresNew`: 新しいトランザクション。同じコンテキストに既に ambient があれば `AlreadyActive`
//! - `Required`: ambient があれば参加、なければ新規
//! - `Suppress`: トランザクションなし（書き込みは即時反映）
//!
//! 本物のトランザクションエンジンではありません。分離レベルは記録するだけで、
//! 並行する commit は後勝ちです。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::TransactionError;
use crate::ports::{
    IsolationLevel, ScopeOption, TransactionBoundary, TransactionManager, TransactionOptions,
    ambient,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionCounters {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

/// Identifier of an in-memory transaction, unique per process.
pub type TransactionId = ambient::AmbientId;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Pending {
    isolation_level: IsolationLevel,
    /// `None` = delete.
    writes: BTreeMap<String, Option<Value>>,
    doomed: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    data: BTreeMap<String, Value>,
    pending: HashMap<TransactionId, Pending>,
    /// Ambient slot used outside any `ambient::fork()`.
    root: Option<TransactionId>,
    counters: TransactionCounters,
}

impl StoreState {
    fn ambient(&self) -> Option<TransactionId> {
        if ambient::in_context() {
            ambient::current()
        } else {
            self.root
        }
    }

    fn set_ambient(&mut self, id: Option<TransactionId>) {
        if ambient::in_context() {
            ambient::set(id);
        } else {
            self.root = id;
        }
    }

    fn clear_ambient(&mut self, id: TransactionId) {
        if self.ambient() == Some(id) {
            self.set_ambient(None);
        }
    }

    fn ambient_pending(&self) -> Option<&Pending> {
        self.pending.get(&self.ambient()?)
    }

    fn ambient_pending_mut(&mut self) -> Option<&mut Pending> {
        let id = self.ambient()?;
        self.pending.get_mut(&id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read through the ambient transaction's staged writes.
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.state.lock();
        if let Some(pending) = state.ambient_pending()
            && let Some(staged) = pending.writes.get(key)
        {
            return staged.clone();
        }
        state.data.get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, value: Value) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let key = key.into();
        match state.ambient_pending_mut() {
            Some(pending) => {
                pending.writes.insert(key, Some(value));
            }
            None => {
                state.data.insert(key, value);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.ambient_pending_mut() {
            Some(pending) => {
                pending.writes.insert(key.to_string(), None);
            }
            None => {
                state.data.remove(key);
            }
        }
    }

    /// Committed data only.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.state.lock().data.clone()
    }

    pub fn counters(&self) -> TransactionCounters {
        self.state.lock().counters
    }

    /// The caller's ambient transaction, if it belongs to this store.
    pub fn current_transaction(&self) -> Option<TransactionId> {
        let state = self.state.lock();
        state.ambient().filter(|id| state.pending.contains_key(id))
    }

    pub fn current_isolation(&self) -> Option<IsolationLevel> {
        self.state
            .lock()
            .ambient_pending()
            .map(|p| p.isolation_level)
    }

    /// Transactions begun and not yet committed or rolled back, across all contexts.
    pub fn open_transactions(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn begin(&self, isolation_level: IsolationLevel) -> Result<TransactionId, TransactionError> {
        let mut state = self.state.lock();
        if state.ambient().is_some() {
            return Err(TransactionError::AlreadyActive);
        }

        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        state.pending.insert(
            id,
            Pending {
                isolation_level,
                writes: BTreeMap::new(),
                doomed: None,
            },
        );
        state.set_ambient(Some(id));
        state.counters.begun += 1;
        debug!(txn_id = id, isolation = %isolation_level, "transaction begun");
        Ok(id)
    }

    fn commit(&self, id: TransactionId) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        let Some(pending) = state.pending.remove(&id) else {
            return Err(TransactionError::Aborted(format!(
                "transaction {id} is not active"
            )));
        };
        state.clear_ambient(id);

        if let Some(reason) = pending.doomed {
            state.counters.rolled_back += 1;
            warn!(txn_id = id, reason = %reason, "doomed transaction rolled back on commit");
            return Err(TransactionError::Aborted(reason));
        }

        for (key, write) in pending.writes {
            match write {
                Some(value) => {
                    state.data.insert(key, value);
                }
                None => {
                    state.data.remove(&key);
                }
            }
        }
        state.counters.committed += 1;
        debug!(txn_id = id, "transaction committed");
        Ok(())
    }

    fn rollback(&self, id: TransactionId) {
        let mut state = self.state.lock();
        if state.pending.remove(&id).is_some() {
            state.clear_ambient(id);
            state.counters.rolled_back += 1;
            debug!(txn_id = id, "transaction rolled back");
        }
    }

    /// Mark a transaction so that its commit fails.
    fn doom(&self, id: TransactionId, reason: &str) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.get_mut(&id) {
            pending.doomed.get_or_insert_with(|| reason.to_string());
        }
    }
}

/// InMemoryTransactionManager は InMemoryStore にトランザクションを張る
#[derive(Debug, Clone)]
pub struct InMemoryTransactionManager {
    store: Arc<InMemoryStore>,
}

impl InMemoryTransactionManager {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    fn open(&self, options: TransactionOptions) -> Result<Box<dyn TransactionBoundary>, TransactionError> {
        let id = self.store.begin(options.isolation_level)?;
        Ok(Box::new(InMemoryBoundary {
            store: Arc::clone(&self.store),
            id,
            started: Instant::now(),
            timeout: options.timeout,
            completed: false,
        }))
    }
}

impl TransactionManager for InMemoryTransactionManager {
    fn begin(
        &self,
        option: ScopeOption,
        options: TransactionOptions,
    ) -> Result<Box<dyn TransactionBoundary>, TransactionError> {
        match option {
            ScopeOption::Suppress => Ok(Box::new(SuppressedBoundary)),
            ScopeOption::Required => match self.store.current_transaction() {
                Some(id) => Ok(Box::new(JoinedBoundary {
                    store: Arc::clone(&self.store),
                    id,
                    completed: false,
                })),
                None => self.open(options),
            },
            ScopeOption::RequiresNew => self.open(options),
        }
    }
}

/// Owns the ambient transaction; rolls back on drop unless completed.
struct InMemoryBoundary {
    store: Arc<InMemoryStore>,
    id: TransactionId,
    started: Instant,
    timeout: Option<Duration>,
    completed: bool,
}

#[async_trait]
impl TransactionBoundary for InMemoryBoundary {
    async fn complete(self: Box<Self>) -> Result<(), TransactionError> {
        if let Some(timeout) = self.timeout
            && self.started.elapsed() > timeout
        {
            // self が drop されて rollback
            return Err(TransactionError::Timeout(timeout));
        }

        // commit は成功・失敗どちらでも ambient を外す
        let mut this = self;
        this.completed = true;
        this.store.commit(this.id)
    }
}

impl Drop for InMemoryBoundary {
    fn drop(&mut self) {
        if !self.completed {
            self.store.rollback(self.id);
        }
    }
}

/// Joined into someone else's transaction. Dropping it without completing
/// dooms the outer transaction instead of rolling it back right away.
struct JoinedBoundary {
    store: Arc<InMemoryStore>,
    id: TransactionId,
    completed: bool,
}

#[async_trait]
impl TransactionBoundary for JoinedBoundary {
    async fn complete(self: Box<Self>) -> Result<(), TransactionError> {
        let mut this = self;
        this.completed = true;
        Ok(())
    }
}

impl Drop for JoinedBoundary {
    fn drop(&mut self) {
        if !self.completed {
            self.store.doom(self.id, "inner scope was not completed");
        }
    }
}

struct SuppressedBoundary;

#[async_trait]
impl TransactionBoundary for SuppressedBoundary {
    async fn complete(self: Box<Self>) -> Result<(), TransactionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(timeout: Option<Duration>) -> TransactionOptions {
        TransactionOptions {
            isolation_level: IsolationLevel::Serializable,
            timeout,
        }
    }

    fn setup() -> (Arc<InMemoryStore>, InMemoryTransactionManager) {
        let store = Arc::new(InMemoryStore::new());
        let manager = InMemoryTransactionManager::new(Arc::clone(&store));
        (store, manager)
    }

    #[tokio::test]
    async fn commit_applies_staged_writes() {
        let (store, manager) = setup();
        store.put("gone", json!(0));

        let boundary = manager.begin(ScopeOption::RequiresNew, options(None)).unwrap();
        store.put("a", json!(1));
        store.remove("gone");
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.get("gone"), None);
        assert!(store.snapshot().get("a").is_none());

        boundary.complete().await.unwrap();

        assert_eq!(store.snapshot(), BTreeMap::from([("a".to_string(), json!(1))]));
        assert_eq!(
            store.counters(),
            TransactionCounters {
                begun: 1,
                committed: 1,
                rolled_back: 0
            }
        );
    }

    #[test]
    fn drop_without_complete_rolls_back() {
        let (store, manager) = setup();

        let boundary = manager.begin(ScopeOption::RequiresNew, options(None)).unwrap();
        store.put("a", json!(1));
        drop(boundary);

        assert_eq!(store.get("a"), None);
        assert_eq!(store.current_transaction(), None);
        assert_eq!(store.counters().rolled_back, 1);
    }

    #[tokio::test]
    async fn complete_after_timeout_fails_and_rolls_back() {
        let (store, manager) = setup();

        let boundary = manager
            .begin(ScopeOption::RequiresNew, options(Some(Duration::from_millis(1))))
            .unwrap();
        store.put("a", json!(1));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = boundary.complete().await.unwrap_err();
        assert_eq!(err, TransactionError::Timeout(Duration::from_millis(1)));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.counters().rolled_back, 1);
    }

    #[test]
    fn requires_new_inside_ambient_is_rejected() {
        let (_store, manager) = setup();

        let _outer = manager.begin(ScopeOption::RequiresNew, options(None)).unwrap();
        let inner = manager.begin(ScopeOption::RequiresNew, options(None));
        assert!(matches!(inner, Err(TransactionError::AlreadyActive)));
    }

    #[tokio::test]
    async fn required_joins_and_dooms_on_drop() {
        let (store, manager) = setup();

        let outer = manager.begin(ScopeOption::Required, options(None)).unwrap();
        let outer_id = store.current_transaction();
        {
            let inner = manager.begin(ScopeOption::Required, options(None)).unwrap();
            assert_eq!(store.current_transaction(), outer_id);
            store.put("a", json!(1));
            drop(inner);
        }

        let err = outer.complete().await.unwrap_err();
        assert!(matches!(err, TransactionError::Aborted(_)));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.counters().begun, 1);
    }

    #[tokio::test]
    async fn suppress_writes_through() {
        let (store, manager) = setup();

        let boundary = manager.begin(ScopeOption::Suppress, options(None)).unwrap();
        store.put("a", json!(1));
        drop(boundary);

        assert_eq!(store.snapshot().get("a"), Some(&json!(1)));
        assert_eq!(store.counters(), TransactionCounters::default());
    }

    #[tokio::test]
    async fn isolation_level_is_visible_inside_the_transaction() {
        let (store, manager) = setup();

        let boundary = manager
            .begin(
                ScopeOption::RequiresNew,
                TransactionOptions {
                    isolation_level: IsolationLevel::ReadCommitted,
                    timeout: None,
                },
            )
            .unwrap();
        assert_eq!(store.current_isolation(), Some(IsolationLevel::ReadCommitted));

        boundary.complete().await.unwrap();
        assert_eq!(store.current_isolation(), None);
    }

    /// Open a transaction in its own context, write, yield, then commit or drop.
    async fn run_in_context(
        store: &InMemoryStore,
        manager: &InMemoryTransactionManager,
        option: ScopeOption,
        key: &str,
        commit: bool,
    ) -> Result<Option<TransactionId>, TransactionError> {
        ambient::fork(async {
            let boundary = manager.begin(option, options(None))?;
            let id = store.current_transaction();
            store.put(key, json!(1));
            tokio::task::yield_now().await;
            assert_eq!(store.current_transaction(), id);
            if commit {
                boundary.complete().await?;
            }
            Ok(id)
        })
        .await
    }

    #[tokio::test]
    async fn concurrent_contexts_get_separate_transactions() {
        let (store, manager) = setup();

        let (a, b) = tokio::join!(
            run_in_context(&store, &manager, ScopeOption::RequiresNew, "a", true),
            run_in_context(&store, &manager, ScopeOption::RequiresNew, "b", false)
        );

        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(store.snapshot(), BTreeMap::from([("a".to_string(), json!(1))]));
        assert_eq!(
            store.counters(),
            TransactionCounters {
                begun: 2,
                committed: 1,
                rolled_back: 1
            }
        );
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn required_does_not_join_a_sibling_context() {
        let (store, manager) = setup();

        let (good, bad) = tokio::join!(
            run_in_context(&store, &manager, ScopeOption::Required, "good", true),
            run_in_context(&store, &manager, ScopeOption::Required, "bad", false)
        );

        assert_ne!(good.unwrap(), bad.unwrap());
        assert_eq!(store.get("bad"), None);
        assert_eq!(store.snapshot().len(), 1);
    }
}
