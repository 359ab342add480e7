//! Thread-per-manager platform
//!
//! A `Switchboard` routes encoded frames between managers that each live on
//! their own OS thread. Every registered manager gets a tokio unbounded
//! channel for inbound frames and a current-thread runtime used only to wait
//! on that channel with a timeout. The managers themselves never leave their
//! threads; only frames cross.

use core::time::Duration;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use switchyard_core::{codec, Address, ComponentType, Message, MessageBody, Result, SwitchyardError};

use crate::event_loop::Inbound;
use crate::platform::{PeerLaunch, PeerRequestOutcome, Platform};

/// Starts a manager thread for a peer request
pub type Spawner = Arc<dyn Fn(&Switchboard, PeerLaunch) -> Result<()> + Send + Sync>;

type WakeHint = Rc<Cell<Option<Duration>>>;

// ----------------------------------------------------------------------------
// Switchboard
// ----------------------------------------------------------------------------

struct SwitchboardInner {
    routes: DashMap<i32, UnboundedSender<Vec<u8>>>,
    next_manager: AtomicI32,
    spawner: RwLock<Option<Spawner>>,
}

/// Frame router shared by every manager thread
#[derive(Clone)]
pub struct Switchboard {
    inner: Arc<SwitchboardInner>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SwitchboardInner {
                routes: DashMap::new(),
                next_manager: AtomicI32::new(1),
                spawner: RwLock::new(None),
            }),
        }
    }

    /// Install the function used to start managers for peer requests
    pub fn set_spawner<F>(&self, spawner: F)
    where
        F: Fn(&Switchboard, PeerLaunch) -> Result<()> + Send + Sync + 'static,
    {
        match self.inner.spawner.write() {
            Ok(mut slot) => *slot = Some(Arc::new(spawner)),
            Err(_) => warn!("spawner lock poisoned, keeping previous spawner"),
        }
    }

    fn spawner(&self) -> Option<Spawner> {
        self.inner.spawner.read().ok().and_then(|slot| slot.clone())
    }

    /// Reserve a fresh non-root manager number
    pub fn allocate_manager(&self) -> Result<i32> {
        let number = self.inner.next_manager.fetch_add(1, Ordering::SeqCst);
        if number <= 0 || number == i32::MAX {
            return Err(SwitchyardError::out_of_memory("manager numbers exhausted"));
        }
        Ok(number)
    }

    /// Open the inbound route of manager `number`
    ///
    /// Must be called on the thread that will own the manager.
    pub fn register(&self, number: i32) -> Result<(ThreadPlatform, ThreadInbound)> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|err| SwitchyardError::generic(format!("building runtime: {}", err)))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        if self.inner.routes.insert(number, sender).is_some() {
            warn!(manager = number, "replacing existing route");
        }
        debug!(manager = number, "route registered");

        let wake: WakeHint = Rc::new(Cell::new(None));
        Ok((
            ThreadPlatform {
                number,
                board: self.clone(),
                wake: Rc::clone(&wake),
            },
            ThreadInbound {
                receiver,
                runtime,
                wake,
            },
        ))
    }

    pub fn unregister(&self, number: i32) -> bool {
        self.inner.routes.remove(&number).is_some()
    }

    pub fn is_registered(&self, number: i32) -> bool {
        self.inner.routes.contains_key(&number)
    }

    pub fn managers(&self) -> Vec<i32> {
        let mut numbers: Vec<i32> = self.inner.routes.iter().map(|entry| *entry.key()).collect();
        numbers.sort_unstable();
        numbers
    }

    /// Encode a message and push it to its destination manager
    pub fn route(&self, message: &Message) -> Result<()> {
        let dst = message.dst.manager;
        let frame = codec::encode(message)?;
        let sender = self
            .inner
            .routes
            .get(&dst)
            .ok_or_else(|| SwitchyardError::no_such_resource(format!("route to manager {}", dst)))?;
        sender
            .send(frame)
            .map_err(|_| SwitchyardError::no_such_resource(format!("manager {} stopped", dst)))?;
        trace!(to = dst, "frame routed");
        Ok(())
    }

    /// Tell the root that manager `number` is gone
    pub fn report_gone(&self, number: i32) {
        if number == 0 {
            return;
        }
        let notice = Message::new(Address::manager(number), Address::ROOT, MessageBody::Disconnected);
        if let Err(err) = self.route(&notice) {
            debug!(manager = number, "could not report departure: {}", err);
        }
    }

    /// Start a manager thread with a freshly allocated number
    pub fn spawn_manager<F>(&self, setup: F) -> Result<(i32, JoinHandle<Result<()>>)>
    where
        F: FnOnce(i32, Switchboard) -> Result<()> + Send + 'static,
    {
        let number = self.allocate_manager()?;
        let handle = self.spawn_numbered(number, setup)?;
        Ok((number, handle))
    }

    /// Start a manager thread for an already reserved number
    ///
    /// The route is removed when `setup` returns. A manager that fails or
    /// panics is reported to the root as disconnected; a clean exit is
    /// expected to have said goodbye itself.
    pub fn spawn_numbered<F>(&self, number: i32, setup: F) -> Result<JoinHandle<Result<()>>>
    where
        F: FnOnce(i32, Switchboard) -> Result<()> + Send + 'static,
    {
        let board = self.clone();
        thread::Builder::new()
            .name(format!("switchyard-{}", number))
            .spawn(move || {
                let worker_board = board.clone();
                let outcome = panic::catch_unwind(AssertUnwindSafe(move || setup(number, worker_board)));
                board.unregister(number);

                let result = outcome.unwrap_or_else(|_| {
                    Err(SwitchyardError::generic(format!("manager {} panicked", number)))
                });
                match &result {
                    Ok(()) => info!(manager = number, "manager thread finished"),
                    Err(err) => {
                        warn!(manager = number, "manager thread failed: {}", err);
                        board.report_gone(number);
                    }
                }
                result
            })
            .map_err(|err| SwitchyardError::generic(format!("spawning manager {}: {}", number, err)))
    }
}

impl Default for Switchboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Switchboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switchboard")
            .field("managers", &self.managers())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Per-Thread Endpoints
// ----------------------------------------------------------------------------

/// Platform of a manager attached to a `Switchboard`
pub struct ThreadPlatform {
    number: i32,
    board: Switchboard,
    wake: WakeHint,
}

impl ThreadPlatform {
    pub fn board(&self) -> &Switchboard {
        &self.board
    }
}

impl Platform for ThreadPlatform {
    fn send(&mut self, message: Message) -> Result<()> {
        self.board.route(&message)
    }

    fn request_run_slice(&mut self, delay: Duration) {
        let earliest = self.wake.get().map_or(delay, |wake| wake.min(delay));
        self.wake.set(Some(earliest));
    }

    fn request_peer(
        &mut self,
        local_manager: i32,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<PeerRequestOutcome> {
        let Some(spawner) = self.board.spawner() else {
            return Ok(PeerRequestOutcome::Local);
        };

        let manager = self.board.allocate_manager()?;
        spawner(
            &self.board,
            PeerLaunch {
                manager,
                requested_by: local_manager,
                requester,
                component_type,
            },
        )?;
        debug!(from = self.number, manager, "peer manager launched");
        Ok(PeerRequestOutcome::Spawned(manager))
    }
}

/// Inbound frames of a manager attached to a `Switchboard`
pub struct ThreadInbound {
    receiver: UnboundedReceiver<Vec<u8>>,
    runtime: tokio::runtime::Runtime,
    wake: WakeHint,
}

impl Inbound for ThreadInbound {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let receiver = &mut self.receiver;
        let waited = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, receiver.recv()).await });

        match waited {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => Err(SwitchyardError::no_such_resource("inbound route closed")),
            Err(_elapsed) => Ok(None),
        }
    }

    fn try_next_frame(&mut self) -> Option<Vec<u8>> {
        self.receiver.try_recv().ok()
    }

    fn take_wake_hint(&mut self) -> Option<Duration> {
        self.wake.take()
    }
}
