//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a root manager that pings echo components hosted on worker threads
    Demo {
        /// Number of worker managers to start
        #[arg(short, long)]
        workers: Option<usize>,
        /// Round trips per worker
        #[arg(short, long)]
        pings: Option<u32>,
        /// Delay between a pong and the next ping, in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },
    /// Classify an address given as "m.c.ch" or as 24 hex digits
    InspectAddress {
        address: String,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}
