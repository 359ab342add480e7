//! Switchyard CLI configuration
//!
//! Configuration is read from a TOML file. Every section and field is
//! optional; missing values fall back to the defaults below and command-line
//! flags override whatever the file says.
//!
//! ```toml
//! [manager]
//! slice_budget_ms = 50
//! report_unreachable = false
//!
//! [demo]
//! workers = 2
//! pings = 3
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::Level;

use switchyard_core::ManagerConfig;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Switchyard CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Settings applied to every manager the CLI builds
    pub manager: ManagerConfig,

    /// Demo topology
    pub demo: DemoConfig,

    pub logging: LoggingConfig,
}

/// Shape of the `demo` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Worker managers, each hosting one echo component
    pub workers: usize,

    /// Round trips per worker
    pub pings: u32,

    /// Pause between a pong and the next ping (milliseconds)
    pub interval_ms: u64,

    /// Give up after this many seconds
    pub timeout_secs: u64,

    /// Event loop poll interval (milliseconds)
    pub poll_ms: u64,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log every dispatch through the tracing observer
    pub trace_dispatch: bool,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            pings: 3,
            interval_ms: 20,
            timeout_secs: 10,
            poll_ms: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            trace_dispatch: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Validation
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file, filling gaps with defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;

        if self.demo.workers == 0 {
            return Err(CliError::Config(
                "Demo needs at least one worker".to_string(),
            ));
        }
        if self.demo.pings == 0 {
            return Err(CliError::Config(
                "Demo needs at least one ping per worker".to_string(),
            ));
        }
        if self.demo.timeout_secs == 0 || self.demo.poll_ms == 0 {
            return Err(CliError::Config(
                "Demo timeout and poll interval must be greater than 0".to_string(),
            ));
        }

        self.log_level()?;
        Ok(())
    }

    /// Parsed log level
    pub fn log_level(&self) -> Result<Level> {
        self.logging
            .level
            .parse::<Level>()
            .map_err(|_| CliError::Config(format!("Unknown log level: {}", self.logging.level)))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level().unwrap(), Level::INFO);
        assert_eq!(config.manager, ManagerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [manager]
            report_unreachable = true

            [demo]
            workers = 4
            "#,
        )
        .unwrap();

        assert!(config.manager.report_unreachable);
        assert_eq!(config.manager.slice_budget_ms, 50);
        assert_eq!(config.demo.workers, 4);
        assert_eq!(config.demo.pings, 3);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.demo.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(CliError::Config(_))));

        let mut config = AppConfig::default();
        config.manager.slice_budget_ms = 0;
        assert!(matches!(config.validate(), Err(CliError::Switchyard(_))));
    }

    #[test]
    fn test_toml_output_reloads() {
        let mut config = AppConfig::default();
        config.demo.pings = 7;
        let text = config.to_toml().unwrap();
        assert!(text.contains("[demo]"));

        let reloaded: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(reloaded, config);
    }
}
