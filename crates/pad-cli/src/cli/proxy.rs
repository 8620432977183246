//! Proxy Command Implementation

use anyhow::{Context, Result};
use pad_core::brand::PRODUCT_NAME;
use pad_core::{Direction, RelayConfig, RelayServer};
use std::path::PathBuf;
use tracing::info;

use super::signal::ShutdownSignal;

/// Build the proxy configuration from a file (or defaults) plus overrides
pub fn load(
    path: Option<PathBuf>,
    backend: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<RelayConfig> {
    let mut config = match path {
        Some(path) => RelayConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let default_path = RelayConfig::default_config_path();
            if default_path.exists() {
                RelayConfig::load(&default_path).with_context(|| {
                    format!("Failed to load config from {}", default_path.display())
                })?
            } else {
                RelayConfig::default()
            }
        }
    };

    if let Some(backend) = backend {
        config = config.with_backend_url(backend);
    }
    if let Some(host) = host {
        config = config.with_bind_host(host);
    }
    if let Some(port) = port {
        config = config.with_bind_port(port);
    }

    config.validate().context("Invalid proxy configuration")?;
    Ok(config)
}

/// Run the proxy until Ctrl-C or SIGTERM
pub async fn run(config: RelayConfig) -> Result<()> {
    let mut signals = ShutdownSignal::install().context("Failed to install signal handlers")?;
    let backend = config.backend_url.clone();
    let server = RelayServer::bind(config)
        .await
        .context("Failed to start the proxy")?;

    let local_addr = server.local_addr();
    let stats = server.stats();
    let shutdown = server.shutdown_token();

    println!("\n{} relay listening on ws://{}", PRODUCT_NAME, local_addr);
    println!("Forwarding every controller to {}", backend);
    println!("Press Ctrl-C to stop\n");

    let signal = tokio::spawn(async move {
        let name = signals.recv().await;
        info!("{} received, shutting down", name);
        shutdown.cancel();
    });

    let result = server.run().await;
    signal.abort();
    result.context("Proxy stopped with an error")?;

    println!(
        "\nServed {} session(s), {} backend failure(s), {} message(s) up, {} down",
        stats.get_sessions_total(),
        stats.get_backend_failures(),
        stats.get_messages(Direction::ClientToBackend),
        stats.get_messages(Direction::BackendToClient),
    );
    Ok(())
}
