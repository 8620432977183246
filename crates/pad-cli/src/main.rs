//! Padrelay CLI
//!
//! Runs the controller relay proxy, or a fleet of simulated controllers
//! against a backend.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Proxy {
            config,
            backend,
            host,
            port,
        } => {
            let config = cli::proxy::load(config, backend, host, port)?;
            init_logging(cli.verbose || config.verbose);
            cli::proxy::run(config).await?;
        }
        Commands::Simulate {
            setup,
            url,
            clients,
            duration,
        } => {
            let setup = cli::simulate::load(setup, url, clients, duration)?;
            init_logging(cli.verbose || setup.verbose);
            cli::simulate::run(setup).await?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise debug when verbose, info when not
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
