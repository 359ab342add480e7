//! Addressed, time-stamped messages
//!
//! Every message kind the manager itself understands is a variant of
//! `MessageBody`; embedder-defined traffic rides in `MessageBody::Opaque`.
//! `Message` deliberately does not implement `Clone`: a message has exactly
//! one owner at any time (its producer, then the inbox, then dispatch or the
//! codec).

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::errors::ErrorKind;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Component Types
// ----------------------------------------------------------------------------

/// Kind of component a factory knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// The per-process singleton component created at startup
    Singleton,
    /// Component used by self tests
    Test,
    /// Out-of-process plugin host
    Plugin,
    /// Embedder-defined component type
    Custom(u32),
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Singleton => write!(f, "singleton"),
            ComponentType::Test => write!(f, "test"),
            ComponentType::Plugin => write!(f, "plugin"),
            ComponentType::Custom(id) => write!(f, "custom#{}", id),
        }
    }
}

// ----------------------------------------------------------------------------
// Status Codes
// ----------------------------------------------------------------------------

/// Status carried by a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    Failed(ErrorKind),
}

impl StatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

impl From<ErrorKind> for StatusCode {
    fn from(kind: ErrorKind) -> Self {
        StatusCode::Failed(kind)
    }
}

// ----------------------------------------------------------------------------
// Message Body
// ----------------------------------------------------------------------------

/// Payload of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// The sender is reachable; also used to announce managers and components
    Connected,
    /// The sender has gone away
    Disconnected,
    /// A creation request was accepted and a peer is being started
    ConnectionPending,
    /// Request to create a component on behalf of the sender
    CreateComponent { component_type: ComponentType },
    /// Status report from the sender
    Status { code: StatusCode },
    /// Embedder-defined message
    Opaque { kind: u32, payload: Vec<u8> },
}

impl MessageBody {
    /// Payload-free tag for this body
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Connected => MessageKind::Connected,
            MessageBody::Disconnected => MessageKind::Disconnected,
            MessageBody::ConnectionPending => MessageKind::ConnectionPending,
            MessageBody::CreateComponent { .. } => MessageKind::CreateComponent,
            MessageBody::Status { .. } => MessageKind::Status,
            MessageBody::Opaque { kind, .. } => MessageKind::Opaque(*kind),
        }
    }

    /// Shorthand for an opaque body
    pub fn opaque(kind: u32, payload: impl Into<Vec<u8>>) -> Self {
        MessageBody::Opaque {
            kind,
            payload: payload.into(),
        }
    }
}

/// Payload-free message classification used by filters and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Connected,
    Disconnected,
    ConnectionPending,
    CreateComponent,
    Status,
    Opaque(u32),
}

impl MessageKind {
    /// Manager protocol traffic, as opposed to embedder messages
    pub fn is_protocol(&self) -> bool {
        !matches!(self, MessageKind::Opaque(_))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Connected => write!(f, "Connected"),
            MessageKind::Disconnected => write!(f, "Disconnected"),
            MessageKind::ConnectionPending => write!(f, "ConnectionPending"),
            MessageKind::CreateComponent => write!(f, "CreateComponent"),
            MessageKind::Status => write!(f, "Status"),
            MessageKind::Opaque(kind) => write!(f, "Opaque({})", kind),
        }
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// A typed, addressed, time-stamped unit of work
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub src: Address,
    pub dst: Address,
    /// Due-time; `Timestamp::ZERO` means "due now"
    pub due: Timestamp,
    pub body: MessageBody,
}

impl Message {
    /// Create a message that is due as soon as it is received
    pub fn new(src: Address, dst: Address, body: MessageBody) -> Self {
        Self {
            src,
            dst,
            due: Timestamp::ZERO,
            body,
        }
    }

    /// Create a message due at an absolute time
    pub fn delayed(src: Address, dst: Address, due: Timestamp, body: MessageBody) -> Self {
        Self { src, dst, due, body }
    }

    /// Builder-style due-time override
    pub fn with_due(mut self, due: Timestamp) -> Self {
        self.due = due;
        self
    }

    /// Both addresses must be valid
    pub fn is_valid(&self) -> bool {
        self.src.is_valid() && self.dst.is_valid()
    }

    /// The due-time is a finite number (infinity and NaN never come due)
    pub fn has_finite_due(&self) -> bool {
        self.due.is_finite()
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Milliseconds until this message is due, never negative
    pub fn delay(&self, now: Timestamp) -> f64 {
        self.due.millis_since(now)
    }

    /// Whether the message is due at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.due <= now
    }

    /// Build a due-now response travelling the opposite way
    pub fn reply(&self, body: MessageBody) -> Message {
        Message::new(self.dst, self.src, body)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {} @{}", self.kind(), self.src, self.dst, self.due)?;
        if let MessageBody::Opaque { payload, .. } = &self.body {
            let shown = &payload[..payload.len().min(16)];
            write!(f, " [{}", hex::encode(shown))?;
            if payload.len() > shown.len() {
                write!(f, "..")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
