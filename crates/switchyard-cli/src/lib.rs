//! Switchyard CLI library
//!
//! Command-line front end for the switchyard component managers: a threaded
//! ping/echo demo, address inspection and configuration output.

pub mod cli;
pub mod commands;
pub mod config;
pub mod demo;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, DemoConfig, LoggingConfig};
pub use demo::{run_demo, DemoReport, WorkerReport};
pub use error::{CliError, Result};
