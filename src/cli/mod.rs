//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the apistub
//! binary: a foreground `serve` command plus the control-plane helpers that
//! CI scripts run against an already-listening instance.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Stub API server command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "apistub",
    about = "Deterministic stub API server for test harnesses",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the stub server in the foreground.
    Serve {
        #[command(flatten)]
        target: Target,

        /// Interface to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// JSON file of fixture definitions (defaults to the built-in scenario).
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Treat an already-listening healthy server as ready instead of
        /// failing on a port conflict.
        #[arg(long, env = "APISTUB_REUSE_EXISTING", default_value_t = false)]
        reuse_existing: bool,

        /// Seconds in-flight requests may take to finish during shutdown.
        #[arg(long, default_value_t = 5)]
        drain_timeout: u64,
    },

    /// Ask a running server to shut down gracefully.
    Stop {
        #[command(flatten)]
        target: Target,
    },

    /// Restore a running server's fixtures to their baseline.
    Reset {
        #[command(flatten)]
        target: Target,
    },

    /// Probe a running server's health endpoint.
    Status {
        #[command(flatten)]
        target: Target,
    },
}

/// Which server instance a command addresses.
#[derive(Args, Debug)]
pub struct Target {
    /// Port of the server.
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
}
