//! Dispatcher port - transport から見た dispatcher の入口
//!
//! transport（runner）は届いた envelope ごとに `dispatch_message()` を呼びます。
//! `init()` は最初の dispatch より前に一度だけ（`&mut self` なので、
//! dispatch 中に再初期化されることは型で防がれる）。

use async_trait::async_trait;

use crate::domain::{DispatchError, ImmutableEnvelope};

#[async_trait]
pub trait SingleThreadMessageDispatcher: Send + Sync {
    /// Build and validate the command → consumer mapping.
    fn init(&mut self) -> Result<(), DispatchError>;

    /// Dispatch one envelope. Errors abort the whole batch.
    async fn dispatch_message(&self, envelope: &ImmutableEnvelope) -> Result<(), DispatchError>;
}
