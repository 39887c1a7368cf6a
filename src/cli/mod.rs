//! CLI Module
//!
//! Command-line interface for inspecting the scene catalog and running
//! scripted sessions against the in-memory media backends.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Roomfade - crossfade orchestration for ambient virtual rooms
#[derive(Parser, Debug)]
#[command(name = "roomfade")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Scene title overrides (JSON array of strings or {"title": ...} objects)
    #[arg(short, long, global = true)]
    pub titles: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the scenes with their display titles
    #[command(name = "catalog")]
    Catalog,

    /// Run a scripted session and print one snapshot per step
    #[command(name = "simulate")]
    Simulate {
        /// Whitespace or comma separated steps, e.g. "gesture play wait:800 next"
        #[arg(short, long)]
        script: String,

        /// Print snapshots as JSON lines
        #[arg(long)]
        json: bool,
    },
}
