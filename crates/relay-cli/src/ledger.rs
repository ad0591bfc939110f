//! デモ用の台帳: deposit / withdraw の 2 コマンド
//!
//! 残高は InMemoryStore の `balance:<account>` に入る。
//! withdraw は残高不足で失敗するので、同じ envelope の deposit ごと巻き戻る。

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::domain::{ConsumerError, ImmutableEnvelope, MessageDirectory, MessageInfo};
use relay_core::impls::{InMemoryContainer, InMemoryStore};
use relay_core::typed::{Command, Consume};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub const DEPOSIT_CONSUMER: &str = "DepositConsumer";
pub const WITHDRAW_CONSUMER: &str = "WithdrawConsumer";

#[derive(Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub account: String,
    pub amount: i64,
}

impl Command for Deposit {
    const TYPE: &'static str = "ledger.deposit.v1";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Withdraw {
    pub account: String,
    pub amount: i64,
}

impl Command for Withdraw {
    const TYPE: &'static str = "ledger.withdraw.v1";
}

fn balance_key(account: &str) -> String {
    format!("balance:{account}")
}

fn balance(store: &InMemoryStore, account: &str) -> i64 {
    store
        .get(&balance_key(account))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

pub struct DepositConsumer {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl Consume<Deposit> for DepositConsumer {
    async fn consume(&self, command: Deposit, _envelope: &ImmutableEnvelope) -> Result<(), ConsumerError> {
        if command.amount <= 0 {
            return Err(ConsumerError::rejected(format!(
                "deposit amount must be positive, got {}",
                command.amount
            )));
        }
        let next = balance(&self.store, &command.account) + command.amount;
        self.store.put(balance_key(&command.account), json!(next));
        debug!(account = %command.account, balance = next, "deposited");
        Ok(())
    }
}

pub struct WithdrawConsumer {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl Consume<Withdraw> for WithdrawConsumer {
    async fn consume(&self, command: Withdraw, _envelope: &ImmutableEnvelope) -> Result<(), ConsumerError> {
        let current = balance(&self.store, &command.account);
        if current < command.amount {
            return Err(ConsumerError::rejected(format!(
                "insufficient funds in {}: balance {current}, requested {}",
                command.account, command.amount
            )));
        }
        let next = current - command.amount;
        self.store.put(balance_key(&command.account), json!(next));
        debug!(account = %command.account, balance = next, "withdrew");
        Ok(())
    }
}

pub fn directory() -> MessageDirectory {
    MessageDirectory::default()
        .with(MessageInfo::command(Deposit::TYPE, DEPOSIT_CONSUMER))
        .with(MessageInfo::command(Withdraw::TYPE, WITHDRAW_CONSUMER))
}

pub fn container(store: &Arc<InMemoryStore>) -> InMemoryContainer {
    let deposit_store = Arc::clone(store);
    let withdraw_store = Arc::clone(store);
    InMemoryContainer::builder()
        .register_typed::<Deposit, _, _>(DEPOSIT_CONSUMER, move || DepositConsumer {
            store: Arc::clone(&deposit_store),
        })
        .register_typed::<Withdraw, _, _>(WITHDRAW_CONSUMER, move || WithdrawConsumer {
            store: Arc::clone(&withdraw_store),
        })
        .build()
}

/// (account, balance) for every committed balance, sorted by account.
pub fn balances(store: &InMemoryStore) -> Vec<(String, i64)> {
    store
        .snapshot()
        .into_iter()
        .filter_map(|(key, value)| {
            let account = key.strip_prefix("balance:")?;
            Some((account.to_string(), value.as_i64()?))
        })
        .collect()
}
