//! Error types for the Switchyard component manager
//!
//! This module contains the error taxonomy shared by every crate in the
//! workspace: the main `SwitchyardError`, the codec-specific `CodecError`, and
//! the payload-free `ErrorKind` used when an error has to travel inside a
//! status report.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Error Kind
// ----------------------------------------------------------------------------

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Allocation or address-space exhaustion; partial state must be rolled back
    OutOfMemory,
    /// A required message or argument was missing
    NullPointer,
    /// A message carried an unset source or destination
    InvalidAddress,
    /// The target (platform, peer, component, factory entry) does not exist
    NoSuchResource,
    /// Anything not otherwise classified (serialization, dispatch)
    Generic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OutOfMemory => write!(f, "out of memory"),
            ErrorKind::NullPointer => write!(f, "null pointer"),
            ErrorKind::InvalidAddress => write!(f, "invalid address"),
            ErrorKind::NoSuchResource => write!(f, "no such resource"),
            ErrorKind::Generic => write!(f, "generic error"),
        }
    }
}

// ----------------------------------------------------------------------------
// Codec Error
// ----------------------------------------------------------------------------

/// Specific frame decoding error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Frame truncated (expected at least {expected} bytes, got {actual})")]
    Truncated { expected: usize, actual: usize },
    #[error("Unsupported frame version {version}")]
    UnsupportedVersion { version: u8 },
    #[error("Checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
    #[error("Decoded message has an unset address ({src} -> {dst})")]
    InvalidMessage { src: Address, dst: Address },
    #[error("Decoded message has a non-finite due-time ({due})")]
    InvalidDueTime { due: Timestamp },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the component manager
#[derive(Debug, thiserror::Error)]
pub enum SwitchyardError {
    #[error("Out of memory: {context}")]
    OutOfMemory { context: String },

    #[error("Missing required {what}")]
    NullPointer { what: String },

    #[error("Invalid address in message {src} -> {dst}")]
    InvalidAddress { src: Address, dst: Address },

    #[error("Invalid address text: {text:?}")]
    AddressSyntax { text: String },

    #[error("Non-finite due-time {due} in message {src} -> {dst}")]
    InvalidDueTime {
        src: Address,
        dst: Address,
        due: Timestamp,
    },

    #[error("No such resource: {resource}")]
    NoSuchResource { resource: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("{message}")]
    Generic { message: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl SwitchyardError {
    /// Create an out-of-memory error with a context description
    pub fn out_of_memory<T: Into<String>>(context: T) -> Self {
        SwitchyardError::OutOfMemory {
            context: context.into(),
        }
    }

    /// Create a null pointer error naming the missing item
    pub fn null_pointer<T: Into<String>>(what: T) -> Self {
        SwitchyardError::NullPointer { what: what.into() }
    }

    /// Create an invalid address error for a message's address pair
    pub fn invalid_address(src: Address, dst: Address) -> Self {
        SwitchyardError::InvalidAddress { src, dst }
    }

    /// Create an error for a message whose due-time can never come
    pub fn invalid_due_time(src: Address, dst: Address, due: Timestamp) -> Self {
        SwitchyardError::InvalidDueTime { src, dst, due }
    }

    /// Create a no-such-resource error
    pub fn no_such_resource<T: Into<String>>(resource: T) -> Self {
        SwitchyardError::NoSuchResource {
            resource: resource.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        SwitchyardError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a generic error with a message
    pub fn generic<T: Into<String>>(message: T) -> Self {
        SwitchyardError::Generic {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwitchyardError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            SwitchyardError::NullPointer { .. } => ErrorKind::NullPointer,
            SwitchyardError::InvalidAddress { .. }
            | SwitchyardError::AddressSyntax { .. }
            | SwitchyardError::Codec(CodecError::InvalidMessage { .. }) => {
                ErrorKind::InvalidAddress
            }
            SwitchyardError::NoSuchResource { .. } => ErrorKind::NoSuchResource,
            SwitchyardError::Serialization(_)
            | SwitchyardError::InvalidDueTime { .. }
            | SwitchyardError::Codec(_)
            | SwitchyardError::Configuration { .. }
            | SwitchyardError::Generic { .. } => ErrorKind::Generic,
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, SwitchyardError>;
