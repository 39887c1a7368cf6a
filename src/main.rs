//! Roomfade CLI - Crossfade Orchestration Engine
//!
//! Command-line interface for the roomfade engine.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomfade::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Roomfade v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.config.as_deref();
    let titles = cli.titles.as_deref();

    match cli.command {
        Some(Commands::Catalog) => commands::catalog(titles).context("listing catalog")?,
        Some(Commands::Simulate { script, json }) => {
            commands::simulate(config, titles, &script, json).context("running simulation")?
        }
        None => {
            println!("Roomfade v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
        }
    }

    Ok(())
}
