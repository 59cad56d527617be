//! netcafe control-plane server entry point.
//!
//! Wires configuration, the status store, the transport listener, and the
//! discovery beacon together, then runs until Ctrl-C.

use tracing::info;
use tracing_subscriber::EnvFilter;

use netcafe_server::{Server, ServerConfig};

/// Environment variable naming the config file; falls back to
/// `netcafe.toml` in the working directory.
const CONFIG_ENV: &str = "NETCAFE_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging. Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| "netcafe.toml".to_string());
    let config = ServerConfig::load(&config_path)?;
    info!("loaded configuration from {config_path}");

    let mut handle = Server::start(config).await?;

    // Surface status transitions to the log; persistence/business layers
    // would consume this same receiver instead.
    if let Some(mut events) = handle.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!(address = %event.address, state = ?event.state, "client status changed");
            }
        });
    }

    info!("netcafe server ready. Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.shutdown().await;
    Ok(())
}
