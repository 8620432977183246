//! CLI Command Definitions
//!
//! Defines the command-line interface using clap.

pub mod proxy;
pub mod signal;
pub mod simulate;

use clap::{Parser, Subcommand};
use pad_core::brand::{BIN_NAME, DESCRIPTION};
use std::path::PathBuf;

/// Padrelay - WebSocket relay proxy for mobile game controllers
#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(author, version, about = DESCRIPTION, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay proxy
    ///
    /// Accepts controller connections and pairs each one with its own
    /// connection to the game backend until Ctrl-C.
    #[command(visible_alias = "p")]
    Proxy {
        /// Config file (defaults to the user config path if it exists)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Backend WebSocket URL
        #[arg(short, long, value_name = "URL", env = "PADRELAY_BACKEND")]
        backend: Option<String>,

        /// Host to listen on
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Drive simulated controllers against a server
    ///
    /// Connects the clients, registers them as players and streams
    /// movement input for the configured duration.
    #[command(visible_alias = "s")]
    Simulate {
        /// Setup JSON file
        #[arg(short, long, value_name = "FILE")]
        setup: Option<PathBuf>,

        /// Server URL, usually the proxy
        #[arg(short, long, value_name = "URL")]
        url: Option<String>,

        /// Number of clients
        #[arg(short = 'n', long, value_name = "N")]
        clients: Option<usize>,

        /// Seconds to simulate
        #[arg(short, long, value_name = "SECS")]
        duration: Option<u64>,
    },
}
