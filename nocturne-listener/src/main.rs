//! Nocturne Job Listener
//!
//! A worker-side service that watches the on-chain job registry and claims
//! newly submitted jobs for its worker account.
//!
//! Architecture:
//! - Configuration: Load settings from environment
//! - Client: View calls against the node, writes through the transaction relay
//! - Scheduler: Feed watcher polling the registry for newly appended jobs
//! - Services: Job processing (claim / fail / skip)
//!
//! Delivery state is in memory only; after a restart every job currently in
//! the registry is offered to the processor again.

mod config;
mod scheduler;
mod service;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::{FeedWatcher, JobFeed, WatcherConfig};
use crate::service::JobProcessor;
use nocturne_client::{
    ConnectionEvent, ConnectionTracker, JobContract, LedgerClient, NodeClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nocturne_listener=info,nocturne_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Nocturne job listener");

    let config = load_config()?;
    info!(
        "Loaded configuration: worker={}, node_url={}, registry={}",
        config.worker_address, config.node_url, config.contract_address
    );

    let client: Arc<dyn LedgerClient> = Arc::new(NodeClient::new(
        config.node_url.clone(),
        config.relay_url.clone(),
        config.worker_address.clone(),
    ));

    let connection = ConnectionTracker::new();
    connect_with_retry(client.as_ref(), &connection, config.connect_max_retries).await?;

    let contract = JobContract::new(client, config.contract_address.clone());
    let watcher = FeedWatcher::new(
        JobFeed::new(contract.clone()),
        JobProcessor::new(contract, config.default_task_id),
        WatcherConfig {
            poll_interval: config.poll_interval,
            await_handler_completion: config.await_handler_completion,
        },
    );

    info!("Starting to listen for new jobs");
    let handle = watcher.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    handle.stop();
    let delivered = handle.stopped().await;

    if let Err(e) = connection.apply(ConnectionEvent::Disconnect) {
        warn!("{}", e);
    }
    info!("Listener stopped after handling {} job(s)", delivered);

    Ok(())
}

/// Loads configuration from environment variables and validates it
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Poll the node until it answers, with exponential backoff
///
/// The node may not be reachable yet when the listener starts (common in
/// container environments).
async fn connect_with_retry(
    client: &dyn LedgerClient,
    connection: &ConnectionTracker,
    max_retries: u32,
) -> Result<()> {
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;
        connection.apply(ConnectionEvent::ConnectInit)?;

        match client.ledger_info().await {
            Ok(info) => {
                connection.apply(ConnectionEvent::ConnectSuccess)?;
                info!(
                    "Connected to chain {} at ledger version {} (attempt {})",
                    info.chain_id, info.ledger_version, attempt
                );
                return Ok(());
            }
            Err(e) => {
                connection.apply(ConnectionEvent::ConnectFailure(e.to_string()))?;

                // A 4xx means the node URL is wrong, not that the node is still starting
                if e.is_client_error() {
                    error!("Node rejected the connection check: {}", e);
                    return Err(anyhow::anyhow!("Failed to connect to node: {}", e));
                }

                if attempt >= max_retries {
                    error!("Failed to reach node after {} attempts", max_retries);
                    return Err(anyhow::anyhow!("Failed to connect to node: {}", e));
                }

                warn!(
                    "Failed to reach node (attempt {}/{}): {}",
                    attempt, max_retries, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
