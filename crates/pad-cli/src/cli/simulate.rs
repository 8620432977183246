//! Simulate Command Implementation

use anyhow::{Context, Result};
use pad_sim::{Fleet, SimulationSetup};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::signal::ShutdownSignal;

/// Read the setup file (if any) and apply command-line overrides
pub fn load(
    path: Option<PathBuf>,
    url: Option<String>,
    clients: Option<usize>,
    duration: Option<u64>,
) -> Result<SimulationSetup> {
    let mut setup = match path {
        Some(path) => SimulationSetup::load(&path)
            .with_context(|| format!("Failed to load setup from {}", path.display()))?,
        None => SimulationSetup::default(),
    };

    if let Some(url) = url {
        setup = setup.with_websocket(url);
    }
    if let Some(clients) = clients {
        setup = setup.with_clients(clients);
    }
    if let Some(duration) = duration {
        setup = setup.with_duration(Duration::from_secs(duration));
    }

    setup.validate().context("Invalid simulation setup")?;
    Ok(setup)
}

/// Run the fleet, stopping early on Ctrl-C or SIGTERM
pub async fn run(setup: SimulationSetup) -> Result<()> {
    let mut signals = ShutdownSignal::install().context("Failed to install signal handlers")?;
    println!("\nController simulator");
    println!("  websocket: {}", setup.websocket);
    println!("  duration:  {}s", setup.duration);
    println!("  clients:   {}", setup.clients);
    println!("(Press Ctrl-C to stop early)\n");

    let fleet = Fleet::new(setup);
    let cancel = fleet.cancel_token();
    let signal = tokio::spawn(async move {
        let name = signals.recv().await;
        info!("{} received, stopping clients", name);
        cancel.cancel();
    });

    let report = fleet.run().await;
    signal.abort();

    if report.connected == 0 {
        warn!("No clients connected");
    }
    println!("\n{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let setup = load(None, None, None, None).unwrap();
        assert_eq!(setup, SimulationSetup::default());
    }

    #[test]
    fn test_overrides_apply() {
        let setup = load(None, Some("ws://127.0.0.1:9001".to_string()), Some(2), Some(10)).unwrap();
        assert_eq!(setup.websocket, "ws://127.0.0.1:9001");
        assert_eq!(setup.clients, 2);
        assert_eq!(setup.duration, 10);
    }

    #[test]
    fn test_zero_clients_rejected() {
        assert!(load(None, None, Some(0), None).is_err());
    }
}
