//! Command handlers for the Switchyard CLI

use serde::Serialize;
use tracing::info;

use switchyard_core::{Address, ADDRESS_SIZE};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::demo::{run_demo, DemoReport};
use crate::error::{CliError, Result};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        let json = cli.json;
        match cli.command {
            Commands::Demo {
                workers,
                pings,
                interval_ms,
            } => Self::handle_demo_command(config, workers, pings, interval_ms, json),
            Commands::InspectAddress { address } => {
                Self::handle_inspect_address_command(&address, json)
            }
            Commands::ShowConfig => Self::handle_show_config_command(&config),
        }
    }

    /// Handle the demo command
    fn handle_demo_command(
        mut config: AppConfig,
        workers: Option<usize>,
        pings: Option<u32>,
        interval_ms: Option<u64>,
        json: bool,
    ) -> Result<()> {
        if let Some(workers) = workers {
            config.demo.workers = workers;
        }
        if let Some(pings) = pings {
            config.demo.pings = pings;
        }
        if let Some(interval_ms) = interval_ms {
            config.demo.interval_ms = interval_ms;
        }
        config.validate()?;

        info!(
            "Starting demo with {} workers, {} pings each",
            config.demo.workers, config.demo.pings
        );
        let report = run_demo(&config)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_demo_report(&report);
        }
        Ok(())
    }

    /// Handle the inspect-address command
    fn handle_inspect_address_command(text: &str, json: bool) -> Result<()> {
        let inspection = AddressInspection::new(parse_address(text)?);
        if json {
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        } else {
            println!("Address:   {}", inspection.address);
            println!("Wire form: {}", inspection.wire_hex);
            println!("Class:     {}", inspection.class);
            println!("Manager:   {}", inspection.manager);
            if let Some(component) = &inspection.component {
                println!("Component: {}", component);
            }
        }
        Ok(())
    }

    /// Handle the show-config command
    fn handle_show_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Address Inspection
// ----------------------------------------------------------------------------

/// Accept "m.c.ch" or the 12-byte wire form as hex
fn parse_address(text: &str) -> Result<Address> {
    let text = text.trim();
    if text.contains('.') {
        return Ok(text.parse::<Address>()?);
    }

    let digits = text.trim_start_matches("0x");
    let bytes = hex::decode(digits)?;
    let bytes: [u8; ADDRESS_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        CliError::Config(format!(
            "Wire address must be {} bytes, got {}",
            ADDRESS_SIZE,
            bytes.len()
        ))
    })?;
    Ok(Address::from_bytes(&bytes))
}

#[derive(Debug, Serialize)]
struct AddressInspection {
    address: String,
    wire_hex: String,
    class: &'static str,
    manager: String,
    component: Option<String>,
}

impl AddressInspection {
    fn new(address: Address) -> Self {
        let class = if !address.is_valid() {
            "invalid"
        } else if address.is_root() {
            "root manager"
        } else if address.is_component_manager() {
            "component manager"
        } else if address.is_component() {
            "component"
        } else {
            "channel"
        };

        Self {
            address: address.to_string(),
            wire_hex: hex::encode(address.to_bytes()),
            class,
            manager: address.to_manager().to_string(),
            component: address
                .is_channel()
                .then(|| address.to_component().to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Output
// ----------------------------------------------------------------------------

fn print_demo_report(report: &DemoReport) {
    println!("Switchyard demo");
    println!("===============");
    println!(
        "Workers: {} completed, {} refused (of {})",
        report.completed, report.refused, report.workers
    );
    println!(
        "Pongs:   {} ({} per worker)",
        report.pongs, report.pings_per_worker
    );
    println!("Elapsed: {} ms", report.elapsed_ms);
    println!();
    println!(
        "Root:    {} dispatched, {} forwarded, {} peers seen, {} lost",
        report.root.messages_dispatched,
        report.root.messages_forwarded,
        report.root.peers_connected,
        report.root.peers_lost
    );
    for worker in &report.worker_reports {
        println!(
            "Worker {}: {} dispatched, {} slices, {} components destroyed",
            worker.manager,
            worker.stats.messages_dispatched,
            worker.stats.slices_run,
            worker.stats.components_destroyed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_forms() {
        let dotted = parse_address("1.2.3").unwrap();
        assert_eq!(dotted, Address::channel(1, 2, 3));

        let wire = hex::encode(dotted.to_bytes());
        assert_eq!(parse_address(&wire).unwrap(), dotted);
        assert_eq!(parse_address(&format!("0x{}", wire)).unwrap(), dotted);

        assert!(matches!(parse_address("zz"), Err(CliError::HexDecoding(_))));
        assert!(matches!(parse_address("0102"), Err(CliError::Config(_))));
        assert!(matches!(parse_address("1.x.3"), Err(CliError::Switchyard(_))));
    }

    #[test]
    fn test_address_classes() {
        assert_eq!(AddressInspection::new(Address::ROOT).class, "root manager");
        assert_eq!(AddressInspection::new(Address::manager(4)).class, "component manager");
        assert_eq!(AddressInspection::new(Address::component(4, 1)).class, "component");

        let channel = AddressInspection::new(Address::channel(4, 1, 2));
        assert_eq!(channel.class, "channel");
        assert_eq!(channel.component.as_deref(), Some("4.1.0"));

        assert_eq!(AddressInspection::new(Address::UNSET).class, "invalid");
    }
}
