//! Platform collaborator and messenger contracts
//!
//! The manager never owns a transport or an event loop. Everything that
//! crosses a thread or process boundary goes through the `Platform` the
//! manager was built with.

use core::fmt;
use core::ops::BitOr;
use core::time::Duration;

use switchyard_core::{Address, ComponentType, Message, Result};

// ----------------------------------------------------------------------------
// Send Flags
// ----------------------------------------------------------------------------

/// Per-send options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SendFlags(u8);

impl SendFlags {
    pub const NONE: Self = Self(0);

    /// Fail with `NoSuchResource` instead of dropping when no route exists
    pub const REPORT_UNREACHABLE: Self = Self(1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for SendFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ----------------------------------------------------------------------------
// Messenger
// ----------------------------------------------------------------------------

/// Anything that accepts messages
///
/// Every message handed to a messenger must carry two valid addresses;
/// ownership passes to the messenger on every path, including failures.
pub trait Messenger {
    fn send(&mut self, message: Message, flags: SendFlags) -> Result<()>;

    fn receive_message(&mut self, message: Message) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Platform
// ----------------------------------------------------------------------------

/// Result of asking the platform for a peer to host a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRequestOutcome {
    /// Host the component in the requesting manager
    Local,
    /// A new manager with this number is being started for it
    Spawned(i32),
}

impl fmt::Display for PeerRequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerRequestOutcome::Local => write!(f, "local"),
            PeerRequestOutcome::Spawned(number) => write!(f, "spawned manager {}", number),
        }
    }
}

/// A manager a platform started to host a requested component
///
/// The new manager is expected to call `handle_peer_request(requester,
/// component_type)` once it is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerLaunch {
    pub manager: i32,
    pub requested_by: i32,
    pub requester: Address,
    pub component_type: ComponentType,
}

/// Embedding transport and event loop
pub trait Platform {
    /// Deliver a message to another manager
    fn send(&mut self, message: Message) -> Result<()>;

    /// Ask the event loop to run a slice after `delay`
    fn request_run_slice(&mut self, delay: Duration);

    /// Find or start a manager to host a component of `component_type`
    fn request_peer(
        &mut self,
        local_manager: i32,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<PeerRequestOutcome>;

    fn on_component_created(&mut self, _address: Address) {}

    fn on_component_destroyed(&mut self, _address: Address) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_flags() {
        let flags = SendFlags::NONE | SendFlags::REPORT_UNREACHABLE;
        assert!(flags.contains(SendFlags::REPORT_UNREACHABLE));
        assert!(!SendFlags::NONE.contains(SendFlags::REPORT_UNREACHABLE));
        assert!(SendFlags::default().contains(SendFlags::NONE));
    }
}
