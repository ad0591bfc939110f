//! MessageSender port - outbound transport

use async_trait::async_trait;

use crate::domain::{ImmutableEnvelope, SendError};

/// MessageSender は envelope を 1 バッチとして送信する
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_batch(&self, envelope: ImmutableEnvelope) -> Result<(), SendError>;
}
