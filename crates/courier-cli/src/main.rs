//! Courier CLI entry point.
//!
//! Binary name: `courier`
//!
//! Parses CLI arguments, initializes tracing, then dispatches to the demo,
//! config, or completions command.

mod cli;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity, or hand off to the observe crate
    // when OTel export is requested.
    if cli.otel {
        courier_observe::tracing_setup::init_tracing(true)
            .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;
    } else {
        let filter = match cli.verbose {
            0 if cli.quiet => "error",
            0 => "warn",
            1 => "info,courier=debug",
            _ => "trace",
        };
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_target(false)
            .init();
    }

    let result = match cli.command {
        Commands::Demo {
            requests,
            timeout_ms,
        } => cli::demo::run_demo(requests, timeout_ms, cli.json).await,

        Commands::Config { path } => cli::config::show_config(&path, cli.json),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "courier", &mut std::io::stdout());
            Ok(())
        }
    };

    courier_observe::tracing_setup::shutdown_tracing();
    result
}
