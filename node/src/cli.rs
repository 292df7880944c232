//! # CLI Interface
//!
//! Defines the command-line argument structure for `prosynergy-node` using
//! `clap` derive. Supports five subcommands: `run`, `keygen`, `sign`,
//! `settle`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use prosynergy_protocol::config::CHAIN_ID_DEVNET;
use prosynergy_protocol::types::{Address, Amount};

/// Prosynergy settlement node.
///
/// Hosts one KYC-gated token ledger, serves its HTTP API, and exposes
/// Prometheus metrics. Also ships the authorizer-side tooling for producing
/// transfer authorizations.
#[derive(Parser, Debug)]
#[command(
    name = "prosynergy-node",
    about = "Prosynergy KYC settlement node",
    version,
    propagate_version = true
)]
pub struct ProsynergyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "PROSYNERGY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a genesis file and serve the ledger over HTTP.
    Run(RunArgs),
    /// Generate a fresh authorizer key and write it to disk.
    Keygen(KeygenArgs),
    /// Sign one transfer authorization and print the encoded payload.
    Sign(SignArgs),
    /// Apply a JSON batch of transfers to a fresh genesis ledger and print
    /// one JSON line per transfer.
    Settle(SettleArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the genesis file (JSON).
    #[arg(long, short = 'g', env = "PROSYNERGY_GENESIS")]
    pub genesis: PathBuf,

    /// Address to bind both listeners on.
    #[arg(long, env = "PROSYNERGY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the REST API.
    #[arg(long, env = "PROSYNERGY_RPC_PORT", default_value_t = 9841)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "PROSYNERGY_METRICS_PORT", default_value_t = 9842)]
    pub metrics_port: u16,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret key.
    #[arg(long, short = 'o', default_value = "authorizer.key")]
    pub out: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Path to the authorizer key file written by `keygen`.
    #[arg(long, short = 'k', env = "PROSYNERGY_AUTHORIZER_KEY")]
    pub key: PathBuf,

    /// Sender of the transfer being authorized.
    #[arg(long)]
    pub from: Address,

    /// Recipient of the transfer being authorized.
    #[arg(long)]
    pub to: Address,

    /// Transfer value in the smallest unit.
    #[arg(long)]
    pub value: Amount,

    /// The sender's current nonce on the ledger.
    #[arg(long)]
    pub nonce: u64,

    /// Chain id the ledger was deployed with.
    #[arg(long, env = "PROSYNERGY_CHAIN_ID", default_value_t = CHAIN_ID_DEVNET)]
    pub chain_id: u64,
}

/// Arguments for the `settle` subcommand.
#[derive(Parser, Debug)]
pub struct SettleArgs {
    /// Path to the genesis file (JSON).
    #[arg(long, short = 'g', env = "PROSYNERGY_GENESIS")]
    pub genesis: PathBuf,

    /// Path to a JSON array of transfers.
    #[arg(long, short = 'b')]
    pub batch: PathBuf,
}
