//! Claimscan - healthcare billing fraud signal scanner
//!
//! Loads billing, exclusion and identity tables from a data directory,
//! runs every enabled signal detector and writes scored providers as JSON.

use anyhow::Result;
use clap::Parser;
use claimscan::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
