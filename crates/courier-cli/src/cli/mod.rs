//! CLI command definitions and dispatch for the `courier` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod demo;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// RPC over message queues, from the command line.
#[derive(Parser)]
#[command(name = "courier", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans via OpenTelemetry (stdout exporter, local development).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a loopback request/response demo over the in-process broker.
    Demo {
        /// Number of ping requests to send.
        #[arg(long, default_value_t = 3)]
        requests: u32,

        /// Reply wait per request, in milliseconds.
        #[arg(long, default_value_t = 250)]
        timeout_ms: u64,
    },

    /// Load a manager configuration file and display its info table.
    Config {
        /// Path to a TOML configuration file.
        path: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
