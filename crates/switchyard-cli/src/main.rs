//! Switchyard CLI entry point

use clap::Parser;
use tracing::{error, info};

use switchyard_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result};

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration before logging so the file can pick the level
    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level()?
    };
    setup_logging(log_level);

    match &cli.config {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("Using default configuration"),
    }

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli, config) {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging at the given level
fn setup_logging(log_level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(config_path) => AppConfig::load_from_file(config_path),
        None => Ok(AppConfig::default()),
    }
}
