//! Same-thread platform connecting several managers
//!
//! Frames are queued per manager number inside a shared hub; nothing moves
//! until the embedder calls `deliver` or `run_until_idle`. Used by tests and
//! by embedders that host more than one manager on a single thread.

use core::time::Duration;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, trace};

use switchyard_core::{codec, Address, ComponentType, Message, Result, SwitchyardError};

use crate::manager::ComponentManager;
use crate::platform::{PeerLaunch, PeerRequestOutcome, Platform};

// ----------------------------------------------------------------------------
// Hub State
// ----------------------------------------------------------------------------

/// How the hub answers peer requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerPolicy {
    /// Host requested components in the requesting manager
    #[default]
    Local,
    /// Reserve a new manager number and record a `PeerLaunch`
    Spawn,
    /// Fail every request
    Refuse,
}

/// Lifecycle notification received from a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformNotice {
    Created(Address),
    Destroyed(Address),
}

#[derive(Debug, Default)]
struct HubState {
    queues: BTreeMap<i32, VecDeque<Vec<u8>>>,
    wake: BTreeMap<i32, Duration>,
    policy: PeerPolicy,
    next_manager: i32,
    launches: VecDeque<PeerLaunch>,
    notices: Vec<PlatformNotice>,
}

// ----------------------------------------------------------------------------
// Loopback Hub
// ----------------------------------------------------------------------------

/// Shared frame router for managers living on one thread
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Rc<RefCell<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: PeerPolicy) -> Self {
        self.set_policy(policy);
        self
    }

    pub fn set_policy(&self, policy: PeerPolicy) {
        self.state.borrow_mut().policy = policy;
    }

    /// Create the platform for manager `number` and open its queue
    pub fn attach(&self, number: i32) -> LoopbackPlatform {
        let mut state = self.state.borrow_mut();
        state.queues.entry(number).or_default();
        state.next_manager = state.next_manager.max(number.saturating_add(1));
        LoopbackPlatform {
            number,
            state: Rc::clone(&self.state),
        }
    }

    /// Close a manager's queue; frames still queued for it are discarded
    pub fn detach(&self, number: i32) -> usize {
        let mut state = self.state.borrow_mut();
        state.wake.remove(&number);
        state.queues.remove(&number).map_or(0, |queue| queue.len())
    }

    /// Frames waiting for manager `number`
    pub fn pending(&self, number: i32) -> usize {
        self.state
            .borrow()
            .queues
            .get(&number)
            .map_or(0, |queue| queue.len())
    }

    pub fn is_quiet(&self) -> bool {
        self.state.borrow().queues.values().all(|queue| queue.is_empty())
    }

    /// Wake-up most recently requested by manager `number`
    pub fn take_wake(&self, number: i32) -> Option<Duration> {
        self.state.borrow_mut().wake.remove(&number)
    }

    pub fn take_launches(&self) -> Vec<PeerLaunch> {
        self.state.borrow_mut().launches.drain(..).collect()
    }

    pub fn take_notices(&self) -> Vec<PlatformNotice> {
        std::mem::take(&mut self.state.borrow_mut().notices)
    }

    /// Feed every queued frame to `manager`; returns how many were accepted
    pub fn deliver(&self, manager: &mut ComponentManager) -> usize {
        let number = manager.number();
        let mut accepted = 0;
        loop {
            // The borrow must end before the manager runs: it may send
            let frame = self
                .state
                .borrow_mut()
                .queues
                .get_mut(&number)
                .and_then(|queue| queue.pop_front());
            let Some(frame) = frame else {
                break;
            };
            if manager.receive_frame(&frame).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// Deliver and run slices round-robin until no frames move and no
    /// manager has an immediately ready message; returns the rounds used
    pub fn run_until_idle(&self, managers: &mut [&mut ComponentManager], max_rounds: usize) -> usize {
        for round in 1..=max_rounds {
            let mut moved = 0;
            let mut busy = false;

            for manager in managers.iter_mut() {
                moved += self.deliver(manager);
                let budget = manager.config().slice_budget();
                if manager.run_slice(budget) == Some(Duration::ZERO) {
                    busy = true;
                }
            }

            if moved == 0 && !busy && self.is_quiet() {
                trace!(round, "loopback hub idle");
                return round;
            }
        }
        debug!(max_rounds, "loopback hub still busy after round limit");
        max_rounds
    }
}

// ----------------------------------------------------------------------------
// Loopback Platform
// ----------------------------------------------------------------------------

/// Platform handed to one manager attached to a `LoopbackHub`
#[derive(Debug)]
pub struct LoopbackPlatform {
    number: i32,
    state: Rc<RefCell<HubState>>,
}

impl Platform for LoopbackPlatform {
    fn send(&mut self, message: Message) -> Result<()> {
        let dst = message.dst.manager;
        let frame = codec::encode(&message)?;

        let mut state = self.state.borrow_mut();
        let queue = state
            .queues
            .get_mut(&dst)
            .ok_or_else(|| SwitchyardError::no_such_resource(format!("route to manager {}", dst)))?;
        queue.push_back(frame);
        trace!(from = self.number, to = dst, "frame queued");
        Ok(())
    }

    fn request_run_slice(&mut self, delay: Duration) {
        let mut state = self.state.borrow_mut();
        let wake = state.wake.entry(self.number).or_insert(delay);
        *wake = (*wake).min(delay);
    }

    fn request_peer(
        &mut self,
        local_manager: i32,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<PeerRequestOutcome> {
        let mut state = self.state.borrow_mut();
        match state.policy {
            PeerPolicy::Local => Ok(PeerRequestOutcome::Local),
            PeerPolicy::Refuse => Err(SwitchyardError::no_such_resource(format!(
                "host for {} component",
                component_type
            ))),
            PeerPolicy::Spawn => {
                let manager = state.next_manager;
                state.next_manager = manager
                    .checked_add(1)
                    .ok_or_else(|| SwitchyardError::out_of_memory("manager numbers exhausted"))?;
                state.queues.entry(manager).or_default();
                state.launches.push_back(PeerLaunch {
                    manager,
                    requested_by: local_manager,
                    requester,
                    component_type,
                });
                Ok(PeerRequestOutcome::Spawned(manager))
            }
        }
    }

    fn on_component_created(&mut self, address: Address) {
        self.state
            .borrow_mut()
            .notices
            .push(PlatformNotice::Created(address));
    }

    fn on_component_destroyed(&mut self, address: Address) {
        self.state
            .borrow_mut()
            .notices
            .push(PlatformNotice::Destroyed(address));
    }
}
