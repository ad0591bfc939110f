//! InMemorySender - 送信された envelope を記録するだけの MessageSender

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ImmutableEnvelope, SendError};
use crate::ports::MessageSender;

#[derive(Debug, Default)]
pub struct InMemorySender {
    sent: Mutex<Vec<ImmutableEnvelope>>,
}

impl InMemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<ImmutableEnvelope> {
        self.sent.lock().await.clone()
    }

    /// Drain everything sent so far (e.g. to feed it back into a dispatcher).
    pub async fn take(&self) -> Vec<ImmutableEnvelope> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait]
impl MessageSender for InMemorySender {
    async fn send_batch(&self, envelope: ImmutableEnvelope) -> Result<(), SendError> {
        self.sent.lock().await.push(envelope);
        Ok(())
    }
}
