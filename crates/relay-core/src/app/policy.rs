//! TransactionPolicy - トランザクション境界の作り方
//!
//! dispatcher は「境界をどう作るか」を知りません。知っているのは
//! `TransactionPolicy::open()` が境界を返すことだけ。
//!
//! # 組み込み
//! - `requires_new`: バッチごとに新しいトランザクション（serializable, 10 分）
//! - `no_transactions`: 何もしない境界（常に complete 成功）
//! - `custom`: 任意のファクトリ

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::TransactionError;
use crate::ports::{
    IsolationLevel, ScopeOption, TransactionBoundary, TransactionManager, TransactionOptions,
};

/// Timeout applied when none (or zero) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

type BoundaryFactory =
    dyn Fn() -> Result<Box<dyn TransactionBoundary>, TransactionError> + Send + Sync;

/// Isolation and timeout for a managed policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSettings {
    pub isolation_level: IsolationLevel,
    /// `None` or zero falls back to `DEFAULT_TIMEOUT`.
    pub timeout: Option<Duration>,
    /// Lift the timeout entirely. Meant for interactive debugging sessions.
    pub unbounded_timeout: bool,
}

impl TransactionSettings {
    pub fn new(isolation_level: IsolationLevel) -> Self {
        Self {
            isolation_level,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.unbounded_timeout = true;
        self
    }

    pub fn effective_timeout(&self) -> Option<Duration> {
        if self.unbounded_timeout {
            return None;
        }
        Some(
            self.timeout
                .filter(|t| !t.is_zero())
                .unwrap_or(DEFAULT_TIMEOUT),
        )
    }

    pub fn options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation_level: self.isolation_level,
            timeout: self.effective_timeout(),
        }
    }
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::Serializable,
            timeout: None,
            unbounded_timeout: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    NoTransactions,
    Managed {
        option: ScopeOption,
        settings: TransactionSettings,
    },
    Custom,
}

/// TransactionPolicy は境界ファクトリを値として持つ
#[derive(Clone)]
pub struct TransactionPolicy {
    kind: PolicyKind,
    factory: Arc<BoundaryFactory>,
}

impl TransactionPolicy {
    /// Fresh serializable transaction per batch, 10-minute timeout.
    pub fn requires_new(manager: Arc<dyn TransactionManager>) -> Self {
        Self::managed(manager, ScopeOption::RequiresNew, TransactionSettings::default())
    }

    pub fn managed(
        manager: Arc<dyn TransactionManager>,
        option: ScopeOption,
        settings: TransactionSettings,
    ) -> Self {
        let options = settings.options();
        Self {
            kind: PolicyKind::Managed { option, settings },
            factory: Arc::new(move || manager.begin(option, options)),
        }
    }

    pub fn no_transactions() -> Self {
        Self {
            kind: PolicyKind::NoTransactions,
            factory: Arc::new(|| Ok(Box::new(NoopBoundary) as Box<dyn TransactionBoundary>)),
        }
    }

    pub fn custom<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn TransactionBoundary>, TransactionError> + Send + Sync + 'static,
    {
        Self {
            kind: PolicyKind::Custom,
            factory: Arc::new(factory),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn open(&self) -> Result<Box<dyn TransactionBoundary>, TransactionError> {
        (self.factory)()
    }
}

impl fmt::Debug for TransactionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPolicy")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// NoopBoundary は何もしない（常に complete 成功、rollback もしない）
#[derive(Debug, Default)]
pub struct NoopBoundary;

#[async_trait]
impl TransactionBoundary for NoopBoundary {
    async fn complete(self: Box<Self>) -> Result<(), TransactionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rstest::rstest;

    #[derive(Default)]
    struct RecordingManager {
        calls: Mutex<Vec<(ScopeOption, TransactionOptions)>>,
    }

    impl TransactionManager for RecordingManager {
        fn begin(
            &self,
            option: ScopeOption,
            options: TransactionOptions,
        ) -> Result<Box<dyn TransactionBoundary>, TransactionError> {
            self.calls.lock().push((option, options));
            Ok(Box::new(NoopBoundary))
        }
    }

    #[rstest]
    #[case::unset(None, false, Some(DEFAULT_TIMEOUT))]
    #[case::zero(Some(Duration::ZERO), false, Some(DEFAULT_TIMEOUT))]
    #[case::explicit(Some(Duration::from_secs(5)), false, Some(Duration::from_secs(5)))]
    #[case::unbounded(Some(Duration::from_secs(5)), true, None)]
    fn effective_timeout(
        #[case] timeout: Option<Duration>,
        #[case] unbounded_timeout: bool,
        #[case] expected: Option<Duration>,
    ) {
        let settings = TransactionSettings {
            isolation_level: IsolationLevel::Serializable,
            timeout,
            unbounded_timeout,
        };
        assert_eq!(settings.effective_timeout(), expected);
    }

    #[tokio::test]
    async fn requires_new_asks_manager_for_serializable_ten_minutes() {
        let manager = Arc::new(RecordingManager::default());
        let policy = TransactionPolicy::requires_new(manager.clone());

        policy.open().unwrap().complete().await.unwrap();

        let calls = manager.calls.lock();
        assert_eq!(
            calls.as_slice(),
            &[(
                ScopeOption::RequiresNew,
                TransactionOptions {
                    isolation_level: IsolationLevel::Serializable,
                    timeout: Some(DEFAULT_TIMEOUT),
                }
            )]
        );
    }

    #[tokio::test]
    async fn no_transactions_never_touches_a_manager() {
        let policy = TransactionPolicy::no_transactions();
        assert_eq!(policy.kind(), PolicyKind::NoTransactions);
        policy.open().unwrap().complete().await.unwrap();
    }

    #[test]
    fn custom_factory_errors_surface_from_open() {
        let policy = TransactionPolicy::custom(|| Err(TransactionError::AlreadyActive));
        assert_eq!(policy.kind(), PolicyKind::Custom);
        assert!(matches!(policy.open(), Err(TransactionError::AlreadyActive)));
    }
}
