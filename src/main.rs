//! Demo binary: loads configuration, connects a [`ConnectionManager`] to
//! the configured bootstrap list, polls metadata on an interval, and shuts
//! down gracefully on Ctrl+C.

use std::time::Duration;

use tokio::{select, signal, time};
use tracing::{error, info, warn};

use kafka_client_core::config::Config;
use kafka_client_core::manager::ConnectionManager;

/// Sets up tracing/logging by reading the `RUST_LOG` environment variable
/// or using default levels if `RUST_LOG` isn't set.
fn setup() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Kafka client...");
    Ok(())
}

/// Refreshes metadata for `topics` on a fixed interval, logging what the
/// routing tables learn each pass. Runs until cancelled by the caller.
async fn metadata_loop(manager: &ConnectionManager, topics: Vec<String>) {
    let mut ticker = time::interval(Duration::from_secs(30));
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        ticker.tick().await;
        match manager.get_metadata(topics.clone()).await {
            Ok(metadata) => {
                info!(
                    brokers = metadata.brokers.len(),
                    topics = metadata.topics.len(),
                    "metadata refreshed"
                );
            }
            Err(e) => {
                error!(error = %e, "metadata refresh failed");
            }
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let topics: Vec<String> = std::env::var("KAFKA_TOPICS")
        .ok()
        .map(|raw| raw.split(',').map(str::trim).map(String::from).collect())
        .unwrap_or_default();

    let manager = ConnectionManager::connect(config).await?;
    info!("connected to bootstrap broker");

    select! {
        _ = metadata_loop(&manager, topics) => {}
        ctrl_c = signal::ctrl_c() => {
            if let Err(e) = ctrl_c {
                error!("failed to listen for Ctrl+C: {}", e);
            }
            warn!("SIGINT (Ctrl+C) received, shutting down...");
        }
    }

    manager.close().await;
    info!("client has shut down gracefully.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup()?;
    let config = Config::from_env()?;
    run(config).await
}
