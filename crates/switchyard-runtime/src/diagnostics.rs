//! Dispatch observation and manager statistics
//!
//! Observers only watch: nothing they do can change how a message is routed.

use core::fmt;
use core::time::Duration;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use switchyard_core::{Address, Message, MessageKind, Result};

// ----------------------------------------------------------------------------
// Observer Hook
// ----------------------------------------------------------------------------

/// Where a dequeued message was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Manager-level processing
    Manager,
    /// A registered component, by component address
    Component(Address),
}

/// Summary of a dispatched message, available after the message is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchRecord {
    pub src: Address,
    pub dst: Address,
    pub kind: MessageKind,
    pub target: DispatchTarget,
}

/// Ad-hoc manager events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerEvent {
    Announced { manager: i32 },
    RootConnected,
    RootDisconnected,
    PeerConnected { manager: i32 },
    PeerDisconnected { manager: i32 },
    ComponentCreated { address: Address },
    ComponentDestroyed { address: Address },
    ChannelOpened { channel: Address, remote: Address },
    ChannelClosed { channel: Address, remote: Address },
    MessageDropped { src: Address, dst: Address },
    SliceFinished { dispatched: usize, next: Option<Duration> },
}

impl fmt::Display for ManagerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerEvent::Announced { manager } => write!(f, "manager {} announced", manager),
            ManagerEvent::RootConnected => write!(f, "root connected"),
            ManagerEvent::RootDisconnected => write!(f, "root disconnected"),
            ManagerEvent::PeerConnected { manager } => write!(f, "peer {} connected", manager),
            ManagerEvent::PeerDisconnected { manager } => {
                write!(f, "peer {} disconnected", manager)
            }
            ManagerEvent::ComponentCreated { address } => write!(f, "component {} created", address),
            ManagerEvent::ComponentDestroyed { address } => {
                write!(f, "component {} destroyed", address)
            }
            ManagerEvent::ChannelOpened { channel, remote } => {
                write!(f, "channel {} opened to {}", channel, remote)
            }
            ManagerEvent::ChannelClosed { channel, remote } => {
                write!(f, "channel {} to {} closed", channel, remote)
            }
            ManagerEvent::MessageDropped { src, dst } => {
                write!(f, "message {} -> {} dropped", src, dst)
            }
            ManagerEvent::SliceFinished { dispatched, next } => {
                write!(f, "slice dispatched {} (next: {:?})", dispatched, next)
            }
        }
    }
}

/// Hook invoked around every dispatch and on manager events
pub trait DispatchObserver {
    fn before_dispatch(&mut self, _message: &Message, _target: DispatchTarget) {}

    fn after_dispatch(&mut self, _record: &DispatchRecord, _outcome: &Result<()>) {}

    fn event(&mut self, _manager: i32, _event: &ManagerEvent) {}
}

/// Observer forwarding everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn before_dispatch(&mut self, message: &Message, target: DispatchTarget) {
        trace!(%message, ?target, "dispatching");
    }

    fn after_dispatch(&mut self, record: &DispatchRecord, outcome: &Result<()>) {
        match outcome {
            Ok(()) => trace!(kind = %record.kind, dst = %record.dst, "dispatched"),
            Err(err) => warn!(kind = %record.kind, dst = %record.dst, "dispatch failed: {}", err),
        }
    }

    fn event(&mut self, manager: i32, event: &ManagerEvent) {
        match event {
            ManagerEvent::SliceFinished { .. } | ManagerEvent::MessageDropped { .. } => {
                debug!(manager, "{}", event)
            }
            _ => info!(manager, "{}", event),
        }
    }
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters kept by every manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub messages_received: u64,
    pub messages_forwarded: u64,
    pub messages_dispatched: u64,
    pub messages_dropped: u64,
    pub dispatch_failures: u64,
    pub frames_rejected: u64,
    pub slices_run: u64,
    pub components_created: u64,
    pub components_destroyed: u64,
    pub channels_opened: u64,
    pub channels_closed: u64,
    pub peers_connected: u64,
    pub peers_lost: u64,
}
