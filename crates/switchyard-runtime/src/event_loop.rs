//! Event-loop integration
//!
//! `EventLoop` pairs a manager with a source of inbound frames and turns
//! "wait for traffic, then run a slice" into a single `process_events` call.

use core::ops::BitOr;
use core::time::Duration;
use tracing::{debug, trace};

use switchyard_core::Result;

use crate::manager::ComponentManager;

// ----------------------------------------------------------------------------
// Process Flags
// ----------------------------------------------------------------------------

/// What a `process_events` call should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessFlags(u8);

impl ProcessFlags {
    const IPC: u8 = 0b01;
    const SLICES: u8 = 0b10;

    /// Pull inbound frames and run a slice
    pub const ALL: Self = Self(Self::IPC | Self::SLICES);

    /// Only pull inbound frames into the inbox
    pub const IPC_ONLY: Self = Self(Self::IPC);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn runs_slices(self) -> bool {
        self.0 & Self::SLICES != 0
    }
}

impl Default for ProcessFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for ProcessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ----------------------------------------------------------------------------
// Inbound Frames
// ----------------------------------------------------------------------------

/// Source of encoded frames addressed to one manager
pub trait Inbound {
    /// Wait up to `timeout` for a frame; `Ok(None)` on timeout, an error
    /// once the source is closed for good
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Take a frame if one is already waiting
    fn try_next_frame(&mut self) -> Option<Vec<u8>>;

    /// Earliest wake-up the platform asked for since the last call
    fn take_wake_hint(&mut self) -> Option<Duration> {
        None
    }
}

/// Outcome of one `process_events` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub frames: usize,
    pub rejected: usize,
    pub next_wake: Option<Duration>,
}

// ----------------------------------------------------------------------------
// Event Loop
// ----------------------------------------------------------------------------

/// A manager driven by an inbound frame source
pub struct EventLoop<I: Inbound> {
    manager: ComponentManager,
    inbound: I,
    next_wake: Option<Duration>,
}

impl<I: Inbound> EventLoop<I> {
    pub fn new(manager: ComponentManager, inbound: I) -> Self {
        Self {
            manager,
            inbound,
            // Run a slice straight away so a non-root manager announces itself
            next_wake: Some(Duration::ZERO),
        }
    }

    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ComponentManager {
        &mut self.manager
    }

    pub fn into_manager(self) -> ComponentManager {
        self.manager
    }

    /// Wait for traffic (at most `timeout`, less if a slice is due sooner),
    /// feed it to the manager and, unless `IPC_ONLY`, run one slice
    pub fn process_events(&mut self, timeout: Duration, flags: ProcessFlags) -> Result<EventSummary> {
        let mut summary = EventSummary::default();

        if let Some(hint) = self.inbound.take_wake_hint() {
            self.next_wake = Some(self.next_wake.map_or(hint, |wake| wake.min(hint)));
        }

        let wait = match (flags.runs_slices(), self.next_wake) {
            (true, Some(wake)) => timeout.min(wake),
            _ => timeout,
        };

        if let Some(frame) = self.inbound.next_frame(wait)? {
            self.accept(&frame, &mut summary);
            while let Some(frame) = self.inbound.try_next_frame() {
                self.accept(&frame, &mut summary);
            }
        }

        if flags.runs_slices() {
            let budget = self.manager.config().slice_budget();
            self.next_wake = self.manager.run_slice(budget);
        }
        summary.next_wake = self.next_wake;
        trace!(manager = self.manager.number(), ?summary, "events processed");
        Ok(summary)
    }

    /// Process events until `stop` returns true or the inbound source closes
    pub fn run_until<F>(&mut self, poll: Duration, mut stop: F) -> Result<()>
    where
        F: FnMut(&mut ComponentManager) -> bool,
    {
        while !stop(&mut self.manager) {
            if let Err(err) = self.process_events(poll, ProcessFlags::ALL) {
                debug!(manager = self.manager.number(), "event loop ending: {}", err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn accept(&mut self, frame: &[u8], summary: &mut EventSummary) {
        match self.manager.receive_frame(frame) {
            Ok(()) => summary.frames += 1,
            Err(_) => summary.rejected += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_flags() {
        assert!(ProcessFlags::ALL.contains(ProcessFlags::IPC_ONLY));
        assert!(!ProcessFlags::IPC_ONLY.contains(ProcessFlags::ALL));
        assert!(!ProcessFlags::IPC_ONLY.runs_slices());
        assert_eq!(ProcessFlags::default(), ProcessFlags::ALL);
    }
}
