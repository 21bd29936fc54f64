// Copyright (c) 2026 Ledger Core Contributors. MIT License.
// See LICENSE for details.

//! # Ledger Node
//!
//! Entry point for the `ledger-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the world state and either
//! serves the HTTP API or runs a single command against the data
//! directory.
//!
//! - `run`: serve `/invoke`, `/query` and `/metrics`
//! - `invoke`: submit one transaction and commit it
//! - `query`: evaluate one function without committing
//! - `register-token`: create or replace a token record
//! - `register-account`: create or replace an account record
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use ledger_contracts::LedgerContract;
use ledger_protocol::config::PROTOCOL_VERSION;
use ledger_protocol::directory::{register_account, register_token, Account, Token};
use ledger_protocol::storage::{LedgerDb, TxSimulator, VersionedStore};
use ledger_protocol::{Caller, TxContext};

use cli::{Commands, LedgerNodeCli, StoreArgs};
use metrics::LedgerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LedgerNodeCli::parse();
    logging::init_logging(logging::DEFAULT_DIRECTIVES, cli.log_format);

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Invoke(args) => call(args, true),
        Commands::Query(args) => call(args, false),
        Commands::RegisterToken(args) => {
            let token = Token {
                name: args.name.trim().to_string(),
                issuer: args.issuer.trim().to_string(),
                status: !args.disabled,
            };
            administer(&args.store, |tx| Ok(register_token(tx, &token)?))
        }
        Commands::RegisterAccount(args) => {
            let account = Account {
                did_name: args.name.trim().to_string(),
                status: !args.disabled,
            };
            administer(&args.store, |tx| Ok(register_account(tx, &account)?))
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens (creating if needed) the database under the data directory.
fn open_db(store: &StoreArgs) -> Result<LedgerDb> {
    std::fs::create_dir_all(&store.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            store.data_dir.display()
        )
    })?;
    let db_path = store.data_dir.join("db");
    LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// Serves the invoke/query API and the metrics endpoint until shutdown.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.store.data_dir.display(),
        super_admins = args.store.super_admins.len(),
        "starting ledger-node"
    );

    let db = Arc::new(open_db(&args.store)?);
    let node_metrics = Arc::new(LedgerMetrics::new());

    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        db: Arc::clone(&db),
        contract: Arc::new(LedgerContract::default()),
        super_admins: Arc::new(args.store.super_admins.clone()),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
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

    db.flush().context("failed to flush database")?;
    tracing::info!("ledger-node stopped");
    Ok(())
}

/// Runs one function against the data directory. The payload goes to
/// stdout; a contract failure becomes a non-zero exit.
fn call(args: cli::CallArgs, commit: bool) -> Result<()> {
    let db = open_db(&args.store)?;
    let caller = api::resolve_caller(&args.caller, &args.store.super_admins);
    let contract: LedgerContract = LedgerContract::default();
    let call_args = [args.arg];

    let receipt = if commit {
        contract.submit(&db, caller, &args.function, &call_args, Utc::now())
    } else {
        contract.evaluate(&db, caller, &args.function, &call_args, Utc::now())
    };

    if let Some(err) = &receipt.response.error {
        bail!("{} failed ({}): {}", args.function, err.code, err.message);
    }

    println!("{}", String::from_utf8_lossy(&receipt.response.payload));
    if let Some(sequence) = receipt.sequence {
        db.flush().context("failed to flush database")?;
        for event in &receipt.events {
            println!(
                "event {} {}",
                event.topic,
                String::from_utf8_lossy(&event.payload)
            );
        }
        println!("committed tx {} at sequence {}", receipt.tx_id, sequence);
    }
    Ok(())
}

/// Applies an administrative write as its own committed transaction.
fn administer(store: &StoreArgs, apply: impl FnOnce(&mut dyn TxContext) -> Result<()>) -> Result<()> {
    let db = open_db(store)?;
    let mut tx = TxSimulator::new(&db, Caller::super_admin("ledger-node"), "admin", Utc::now());
    apply(&mut tx)?;

    let outcome = tx.finish().context("failed to finish admin transaction")?;
    let sequence = db.commit(&outcome).context("failed to commit admin transaction")?;
    db.flush().context("failed to flush database")?;
    println!("committed at sequence {}", sequence);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("ledger-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
