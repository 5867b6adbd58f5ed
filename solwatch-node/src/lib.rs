pub mod chain_state;
pub mod cli;
pub mod config;
pub mod pubsub;
pub mod storage;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use config::{load_or_default, NodeConfig};
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr, sync::Arc};
use tokio::signal;

use chain_state::RpcChainState;
use pubsub::PubsubConnectionProvider;
use solwatch_connector::{
    events::TracingEventSink,
    storage::{AddressStore, LocalElection},
    workers::{WorkerController, WorkerDeps},
};
use storage::SledAddressStore;

/// The main entry point for running the node application logic.
/// This function handles CLI parsing, configuration, logging, and service startup.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_cmd) => {
            let config = load_or_default(run_cmd.config.as_deref())?;
            solwatch_logger::init(&config.node.log)?;
            tracing::info!("Configuration loaded: {:#?}", &config);
            run_worker(config).await
        }
        Commands::Watch(watch_cmd) => {
            let config = load_or_default(watch_cmd.config.as_deref())?;
            solwatch_logger::init(&config.node.log)?;
            watch_address(&config, &watch_cmd.address).await
        }
    }
}

fn open_store(config: &NodeConfig) -> Result<SledAddressStore> {
    let db = sled::open(&config.node.db_path)
        .with_context(|| format!("Failed to open address database at '{}'", config.node.db_path))?;
    Ok(SledAddressStore::new(db))
}

/// Wires the Solana collaborators into a [`WorkerController`] and starts it.
pub async fn start(config: &NodeConfig) -> Result<Arc<WorkerController>> {
    let solana = &config.connector.solana;
    let deps = WorkerDeps {
        connections: Arc::new(PubsubConnectionProvider::new(solana.ws_url.clone())),
        chain_state: Arc::new(RpcChainState::new(solana.rpc_url.clone(), solana.commitment)),
        addresses: Arc::new(open_store(config)?),
        election: Arc::new(LocalElection::new()),
        sink: Arc::new(TracingEventSink),
    };

    let controller = Arc::new(WorkerController::new(Arc::new(config.connector.clone()), deps));
    controller.start().await?;
    Ok(controller)
}

/// Runs the worker until Ctrl+C, then stops it gracefully.
async fn run_worker(config: NodeConfig) -> Result<()> {
    let controller = start(&config).await?;
    let syncing = tokio::spawn({
        let controller = controller.clone();
        async move { controller.sync().await }
    });

    match signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown..."),
        Err(err) => tracing::error!(error = %err, "Failed to listen for shutdown signal."),
    }

    controller.stop().await;
    if let Err(e) = syncing.await {
        tracing::warn!("Sync task ended abnormally: {}", e);
    }
    tracing::info!("Shutdown complete.");
    Ok(())
}

/// Marks `address` as queried now.
async fn watch_address(config: &NodeConfig, address: &str) -> Result<()> {
    let pubkey = Pubkey::from_str(address).with_context(|| format!("'{}' is not a valid address", address))?;
    let store = open_store(config)?;
    let solana = &config.connector.solana;
    store
        .touch(&solana.chain, &solana.network, &pubkey.to_string(), Utc::now())
        .await?;
    tracing::info!(
        address = %pubkey,
        "Address marked active on {}:{}",
        solana.chain,
        solana.network
    );
    Ok(())
}
