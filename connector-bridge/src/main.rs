use std::sync::Arc;

use anyhow::{Context, Result};
use connector_bridge::{init_logging_from_env, Bridge, BridgeConfig, LoggingMode};
use connector_client::ConnectorClient;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging_from_env(LoggingMode::Development).context("Failed to initialize logging")?;

    if let Err(e) = run().await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = BridgeConfig::from_env().context("Invalid configuration")?;

    let client = ConnectorClient::with_base_url(&config.api_url, &config.token)
        .context("Failed to create device cloud client")?;

    let bridge = Bridge::start(config, Arc::new(client))
        .await
        .context("Failed to start bridge")?;
    info!("Listening on {}", bridge.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    bridge.shutdown().await;
    Ok(())
}
