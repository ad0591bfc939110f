use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "relay",
    about = "Relay: dispatch command batches to their single consumer inside one transaction",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch envelopes from a JSON file against the demo ledger
    Dispatch {
        /// Dispatcher config (TOML). Defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON array of envelopes
        #[arg(long)]
        envelopes: PathBuf,
    },

    /// Validate the config and the ledger's message directory
    Check {
        /// Dispatcher config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
