//! DispatcherBuilder - dispatcher の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use super::batch_dispatcher::CommandBatchDispatcher;
use super::config::{ConfigError, DispatcherConfig};
use crate::domain::{CommandType, DispatchError, MessageDirectory};
use crate::ports::{Container, SingleThreadMessageDispatcher, TransactionManager};

/// DispatcherBuilder は初期化済みの CommandBatchDispatcher を作る
///
/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new(container, manager)
///     .directory(directory)
///     .config(config)
///     .expect_commands(&["ledger.deposit.v1"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - `build()` の中で `init()` まで済ませる（複数 consumer のコマンドはここで失敗）
/// - expect_commands() で期待されるコマンドを登録
/// - 「期待集合 ⊆ 登録済み集合」をチェックし、不足があれば BuildError
pub struct DispatcherBuilder {
    container: Arc<dyn Container>,
    transactions: Arc<dyn TransactionManager>,
    directory: MessageDirectory,
    config: DispatcherConfig,
    expected_commands: Option<Vec<CommandType>>,
}

/// BuildError は dispatcher 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing command types: {0:?}. These commands were expected but have no consumer.")]
    MissingCommandTypes(Vec<String>),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispatcherBuilder {
    pub fn new(container: Arc<dyn Container>, transactions: Arc<dyn TransactionManager>) -> Self {
        Self {
            container,
            transactions,
            directory: MessageDirectory::default(),
            config: DispatcherConfig::default(),
            expected_commands: None,
        }
    }

    pub fn directory(mut self, directory: MessageDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expect_commands(mut self, command_types: &[&str]) -> Self {
        self.expected_commands = Some(command_types.iter().map(|&t| CommandType::new(t)).collect());
        self
    }

    pub fn build(self) -> Result<CommandBatchDispatcher, BuildError> {
        self.config.validate()?;

        let policy = self.config.transaction.policy(Arc::clone(&self.transactions));
        let dedup = self.config.dedup()?;

        let mut dispatcher = CommandBatchDispatcher::new(
            self.container,
            Arc::new(self.directory),
            self.transactions,
        );
        dispatcher.set_policy(policy);
        if let Some(dedup) = dedup {
            dispatcher.enable_dedup(dedup);
        }
        dispatcher.init()?;

        if let Some(expected) = &self.expected_commands {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !dispatcher.registry().contains(t))
                .map(|t| t.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingCommandTypes(missing));
            }
        }

        Ok(dispatcher)
    }
}
