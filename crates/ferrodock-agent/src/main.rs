//! Ferrodock: batch molecular docking.
//! Entry point for the `ferrodock` binary.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "ferrodock=info,warn",
        1 => "ferrodock=debug,info",
        _ => "ferrodock=trace,debug",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Box(args) => commands::geometry::execute(args).await,
    }
}
