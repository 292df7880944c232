// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prosynergy Settlement Node
//!
//! Entry point for the `prosynergy-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and dispatches to a subcommand:
//!
//! - `run`    : load a genesis file and serve the ledger over HTTP
//! - `keygen` : generate an authorizer key
//! - `sign`   : produce the encoded authorization payload for one transfer
//! - `settle` : replay a JSON batch of transfers against a genesis ledger
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tokio::sync::RwLock;

use prosynergy_contracts::{KycToken, SettlementReceipt};
use prosynergy_protocol::crypto::AuthorizerKeypair;

use cli::{Commands, ProsynergyNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ProsynergyNodeCli::parse();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen(args) => keygen(args),
        Commands::Sign(args) => sign(args),
        Commands::Settle(args) => settle(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the genesis ledger and serves the API and metrics endpoints until
/// a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let genesis = config::load_genesis(&args.genesis)?;
    tracing::info!(
        genesis = %args.genesis.display(),
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        chain_id = genesis.chain_id,
        "starting prosynergy-node"
    );

    let token = KycToken::new(genesis).context("failed to initialize token from genesis")?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.observe_ledger(token.total_supply(), token.events().len());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            prosynergy_protocol::config::PROTOCOL_VERSION,
        ),
        token: Arc::new(RwLock::new(token)),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.host, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.host, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("prosynergy-node stopped");
    Ok(())
}

/// Generates an authorizer key and writes it to disk.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = AuthorizerKeypair::generate();
    config::write_authorizer_key(&args.out, &keypair, args.force)?;

    tracing::info!(
        address = %keypair.address(),
        key_path = %args.out.display(),
        "authorizer key generated"
    );

    println!("Authorizer key written.");
    println!("  Key file : {}", args.out.display());
    println!("  Address  : {}", keypair.address());
    Ok(())
}

/// Signs one transfer authorization and prints the ABI-encoded payload as
/// `0x` hex on stdout.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair = config::load_authorizer_key(&args.key)?;
    let payload =
        keypair.authorize_transfer(&args.from, &args.to, args.value, args.chain_id, args.nonce);

    tracing::info!(
        authorizer = %keypair.address(),
        from = %args.from,
        to = %args.to,
        value = %args.value,
        nonce = args.nonce,
        chain_id = args.chain_id,
        "authorization signed"
    );
    println!("0x{}", hex::encode(payload.encode()));
    Ok(())
}

/// One line of `settle` output.
#[derive(Serialize)]
#[serde(untagged)]
enum BatchOutcome {
    Settled {
        index: usize,
        receipt: SettlementReceipt,
    },
    Rejected {
        index: usize,
        error: &'static str,
        message: String,
    },
}

/// Replays a batch of transfers against a fresh genesis ledger.
fn settle(args: cli::SettleArgs) -> Result<()> {
    let genesis = config::load_genesis(&args.genesis)?;
    let batch = config::load_batch(&args.batch)?;
    let mut token = KycToken::new(genesis).context("failed to initialize token from genesis")?;

    let mut settled = 0usize;
    for (index, body) in batch.into_iter().enumerate() {
        let outcome = match token.transfer_by_partition(&body.into_request()) {
            Ok(receipt) => {
                settled += 1;
                BatchOutcome::Settled { index, receipt }
            }
            Err(err) => BatchOutcome::Rejected {
                index,
                error: err.code(),
                message: err.to_string(),
            },
        };
        let line = serde_json::to_string(&outcome).context("failed to encode outcome")?;
        println!("{line}");
    }

    tracing::info!(
        settled,
        total_supply = %token.total_supply(),
        events = token.events().len(),
        "batch complete"
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("prosynergy-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol        {}", prosynergy_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
