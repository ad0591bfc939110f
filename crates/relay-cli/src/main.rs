//! relay CLI: デモ台帳に envelope を流す
//!
//! ```text
//! relay check --config demos/relay.toml
//! relay dispatch --config demos/relay.toml --envelopes demos/envelopes.json
//! ```
//! ログは `RUST_LOG` で調整（既定は info）。

mod cli;
mod ledger;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::domain::EnvelopeId;
use relay_core::impls::{InMemoryStore, InMemoryTransactionManager};
use relay_core::typed::Command;
use relay_core::{
    CommandBatchDispatcher, CommandType, DispatcherBuilder, DispatcherConfig, ImmutableEnvelope,
    SingleThreadMessageDispatcher,
};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use ledger::{Deposit, Withdraw};

/// One envelope as written in the input file.
#[derive(Debug, Deserialize)]
struct EnvelopeInput {
    #[serde(default)]
    id: Option<EnvelopeId>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    items: Vec<ItemInput>,
}

#[derive(Debug, Deserialize)]
struct ItemInput {
    #[serde(rename = "type")]
    command_type: CommandType,
    payload: serde_json::Value,
}

impl EnvelopeInput {
    fn into_envelope(self) -> ImmutableEnvelope {
        let mut builder = ImmutableEnvelope::builder();
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        for (key, value) in self.attributes {
            builder = builder.attribute(key, value);
        }
        self.items
            .into_iter()
            .fold(builder, |b, item| b.item(item.command_type, item.payload))
            .build()
    }
}

fn load_config(path: Option<&Path>) -> Result<DispatcherConfig> {
    let Some(path) = path else {
        return Ok(DispatcherConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    DispatcherConfig::from_toml_str(&text).with_context(|| format!("load config {}", path.display()))
}

fn load_envelopes(path: &Path) -> Result<Vec<ImmutableEnvelope>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read envelopes {}", path.display()))?;
    let inputs: Vec<EnvelopeInput> = serde_json::from_str(&text)
        .with_context(|| format!("parse envelopes {}", path.display()))?;
    Ok(inputs.into_iter().map(EnvelopeInput::into_envelope).collect())
}

fn build_dispatcher(config: DispatcherConfig, store: &Arc<InMemoryStore>) -> Result<CommandBatchDispatcher> {
    let dispatcher = DispatcherBuilder::new(
        Arc::new(ledger::container(store)),
        Arc::new(InMemoryTransactionManager::new(Arc::clone(store))),
    )
    .directory(ledger::directory())
    .config(config)
    .expect_commands(&[Deposit::TYPE, Withdraw::TYPE])
    .build()
    .context("build dispatcher")?;
    Ok(dispatcher)
}

fn check(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = build_dispatcher(config, &store)?;

    println!("policy: {:?}", dispatcher.policy().kind());
    for command_type in dispatcher.registry().command_types() {
        if let Some(consumer) = dispatcher.registry().consumer_for(&command_type) {
            println!("  {command_type} -> {consumer}");
        }
    }
    println!("ok");
    Ok(())
}

async fn dispatch(config: Option<&Path>, envelopes: &Path) -> Result<()> {
    let config = load_config(config)?;
    let envelopes = load_envelopes(envelopes)?;
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = build_dispatcher(config, &store)?;

    let mut failed = 0usize;
    for envelope in &envelopes {
        // 失敗した envelope は巻き戻るだけ。次の envelope は続けて流す
        match dispatcher.dispatch_message(envelope).await {
            Ok(()) => println!("{}: ok ({} items)", envelope.id(), envelope.len()),
            Err(err) => {
                failed += 1;
                warn!(envelope_id = %envelope.id(), error = %err, "envelope failed");
                println!("{}: failed: {err}", envelope.id());
            }
        }
    }

    println!("balances:");
    for (account, balance) in ledger::balances(&store) {
        println!("  {account}: {balance}");
    }
    let counters = store.counters();
    println!(
        "transactions: begun={} committed={} rolled_back={}",
        counters.begun, counters.committed, counters.rolled_back
    );
    info!(total = envelopes.len(), failed, "dispatch finished");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Dispatch { config, envelopes } => dispatch(config.as_deref(), &envelopes).await,
        Commands::Check { config } => check(config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_input_keeps_item_order_and_attributes() {
        let inputs: Vec<EnvelopeInput> = serde_json::from_str(
            r#"[{
                "attributes": { "source": "test" },
                "items": [
                    { "type": "ledger.deposit.v1", "payload": { "account": "a", "amount": 1 } },
                    { "type": "ledger.withdraw.v1", "payload": { "account": "a", "amount": 1 } }
                ]
            }]"#,
        )
        .unwrap();

        let envelope = inputs.into_iter().next().unwrap().into_envelope();
        assert_eq!(envelope.attribute("source"), Some("test"));
        let types: Vec<&str> = envelope.items().iter().map(|i| i.command_type().as_str()).collect();
        assert_eq!(types, vec![Deposit::TYPE, Withdraw::TYPE]);
        assert_eq!(envelope.items()[1].index(), 1);
    }
}
