//! CommandSender - コマンドを 1 つの envelope にまとめて送る
//!
//! 変換もバッチ分割もしない、ただのパススルー。

use std::sync::Arc;

use crate::domain::{ImmutableEnvelope, SendError};
use crate::ports::MessageSender;
use crate::typed::DynCommand;

pub struct CommandSender {
    sender: Arc<dyn MessageSender>,
}

impl CommandSender {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    pub async fn send_commands_as_batch(&self, commands: &[&dyn DynCommand]) -> Result<(), SendError> {
        let mut builder = ImmutableEnvelope::builder();
        for command in commands {
            let payload = command.to_payload().map_err(|source| SendError::Encode {
                command_type: command.command_type(),
                source,
            })?;
            builder = builder.item(command.command_type(), payload);
        }

        self.sender.send_batch(builder.build()).await
    }
}
