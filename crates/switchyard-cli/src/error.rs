//! Error handling for the Switchyard CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Switchyard error: {0}")]
    Switchyard(#[from] switchyard_core::SwitchyardError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Demo failed: {0}")]
    Demo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML output error: {0}")]
    TomlOutput(#[from] toml::ser::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Demo(format!("{:#}", err))
    }
}
