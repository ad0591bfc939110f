//! InMemoryContainer - 開発・テスト用の Container 実装
//!
//! consumer_type → ファクトリ関数 のマップ。
//! `resolve()` のたびにファクトリを呼ぶので、item ごとに別インスタンスになります。
//! スコープの open / resolve / close はジャーナルに記録され、
//! テストから解放順（LIFO）を確認できます。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::{ConsumerType, ResolveError};
use crate::ports::{Consumer, Container, LifetimeScope, ScopeTag};
use crate::typed::{Command, Consume, TypedConsumer};

type ConsumerFactory = dyn Fn() -> Arc<dyn Consumer> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
    Opened(ScopeTag),
    Resolved(ConsumerType),
    Closed(ScopeTag),
}

struct ContainerInner {
    factories: HashMap<ConsumerType, Box<ConsumerFactory>>,
    journal: Mutex<Vec<ScopeEvent>>,
    open_scopes: AtomicUsize,
}

impl ContainerInner {
    fn record(&self, event: ScopeEvent) {
        self.journal.lock().push(event);
    }
}

#[derive(Clone)]
pub struct InMemoryContainer {
    inner: Arc<ContainerInner>,
}

impl InMemoryContainer {
    pub fn builder() -> InMemoryContainerBuilder {
        InMemoryContainerBuilder::default()
    }

    /// Everything that happened to scopes so far, in order.
    pub fn journal(&self) -> Vec<ScopeEvent> {
        self.inner.journal.lock().clone()
    }

    /// Scopes opened and not yet dropped.
    pub fn open_scopes(&self) -> usize {
        self.inner.open_scopes.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, consumer: &ConsumerType) -> bool {
        self.inner.factories.contains_key(consumer)
    }
}

impl Container for InMemoryContainer {
    fn begin_scope(&self, tag: ScopeTag) -> Box<dyn LifetimeScope> {
        Box::new(InMemoryScope::open(Arc::clone(&self.inner), tag))
    }
}

#[derive(Default)]
pub struct InMemoryContainerBuilder {
    factories: HashMap<ConsumerType, Box<ConsumerFactory>>,
}

impl InMemoryContainerBuilder {
    /// Register a factory. Registering the same consumer type again replaces it.
    pub fn register<F>(mut self, consumer: impl Into<ConsumerType>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Consumer> + Send + Sync + 'static,
    {
        self.factories.insert(consumer.into(), Box::new(factory));
        self
    }

    /// Register a typed consumer; each resolve wraps a fresh `H` in `TypedConsumer`.
    pub fn register_typed<C, H, F>(self, consumer: impl Into<ConsumerType>, factory: F) -> Self
    where
        C: Command,
        H: Consume<C> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register(consumer, move || {
            Arc::new(TypedConsumer::<C, H>::new(factory())) as Arc<dyn Consumer>
        })
    }

    pub fn build(self) -> InMemoryContainer {
        InMemoryContainer {
            inner: Arc::new(ContainerInner {
                factories: self.factories,
                journal: Mutex::new(Vec::new()),
                open_scopes: AtomicUsize::new(0),
            }),
        }
    }
}

/// A scope owns the instances it resolved until it is dropped.
struct InMemoryScope {
    inner: Arc<ContainerInner>,
    tag: ScopeTag,
    instances: Mutex<Vec<Arc<dyn Consumer>>>,
}

impl InMemoryScope {
    fn open(inner: Arc<ContainerInner>, tag: ScopeTag) -> Self {
        inner.open_scopes.fetch_add(1, Ordering::SeqCst);
        inner.record(ScopeEvent::Opened(tag));
        Self {
            inner,
            tag,
            instances: Mutex::new(Vec::new()),
        }
    }
}

impl LifetimeScope for InMemoryScope {
    fn tag(&self) -> ScopeTag {
        self.tag
    }

    fn begin_scope(&self, tag: ScopeTag) -> Box<dyn LifetimeScope> {
        Box::new(InMemoryScope::open(Arc::clone(&self.inner), tag))
    }

    fn resolve(&self, consumer: &ConsumerType) -> Result<Arc<dyn Consumer>, ResolveError> {
        let factory = self
            .inner
            .factories
            .get(consumer)
            .ok_or_else(|| ResolveError::NotRegistered(consumer.clone()))?;

        let instance = factory();
        self.instances.lock().push(Arc::clone(&instance));
        self.inner.record(ScopeEvent::Resolved(consumer.clone()));
        Ok(instance)
    }
}

impl Drop for InMemoryScope {
    fn drop(&mut self) {
        self.instances.lock().clear();
        self.inner.open_scopes.fetch_sub(1, Ordering::SeqCst);
        self.inner.record(ScopeEvent::Closed(self.tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConsumerError, ImmutableEnvelope, MessageItem};
    use async_trait::async_trait;

    struct Nothing;

    #[async_trait]
    impl Consumer for Nothing {
        async fn consume(
            &self,
            _item: &MessageItem,
            _envelope: &ImmutableEnvelope,
        ) -> Result<(), ConsumerError> {
            Ok(())
        }
    }

    fn container() -> InMemoryContainer {
        InMemoryContainer::builder()
            .register("Nothing", || Arc::new(Nothing) as Arc<dyn Consumer>)
            .build()
    }

    #[test]
    fn nested_scopes_close_in_lifo_order() {
        let container = container();
        {
            let outer = container.begin_scope(ScopeTag::MessageEnvelope);
            let inner = outer.begin_scope(ScopeTag::MessageItem);
            assert_eq!(outer.tag(), ScopeTag::MessageEnvelope);
            assert_eq!(inner.tag(), ScopeTag::MessageItem);
            inner.resolve(&ConsumerType::new("Nothing")).unwrap();
            assert_eq!(container.open_scopes(), 2);
            drop(inner);
        }

        assert_eq!(container.open_scopes(), 0);
        assert_eq!(
            container.journal(),
            vec![
                ScopeEvent::Opened(ScopeTag::MessageEnvelope),
                ScopeEvent::Opened(ScopeTag::MessageItem),
                ScopeEvent::Resolved(ConsumerType::new("Nothing")),
                ScopeEvent::Closed(ScopeTag::MessageItem),
                ScopeEvent::Closed(ScopeTag::MessageEnvelope),
            ]
        );
    }

    #[test]
    fn each_resolve_builds_a_new_instance() {
        let container = container();
        let scope = container.begin_scope(ScopeTag::MessageItem);

        let a = scope.resolve(&ConsumerType::new("Nothing")).unwrap();
        let b = scope.resolve(&ConsumerType::new("Nothing")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn scope_releases_its_instances_on_drop() {
        let container = container();
        let scope = container.begin_scope(ScopeTag::MessageItem);
        let instance = scope.resolve(&ConsumerType::new("Nothing")).unwrap();
        assert_eq!(Arc::strong_count(&instance), 2);

        drop(scope);
        assert_eq!(Arc::strong_count(&instance), 1);
    }

    #[test]
    fn unknown_consumer_is_a_resolve_error() {
        let container = container();
        let scope = container.begin_scope(ScopeTag::MessageItem);

        let err = scope.resolve(&ConsumerType::new("Ghost")).err().unwrap();
        assert_eq!(err, ResolveError::NotRegistered(ConsumerType::new("Ghost")));
        assert!(container.is_registered(&ConsumerType::new("Nothing")));
    }
}
