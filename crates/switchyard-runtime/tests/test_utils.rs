//! Test utilities for deterministic testing of component managers
//!
//! Mock clock, recording components, a recording platform and a recording
//! observer. Everything records into `Rc<RefCell<..>>` handles so tests can
//! inspect what happened after handing ownership to the manager.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use switchyard_runtime::{
    Address, Component, ComponentManager, ComponentType, Context, DispatchObserver, DispatchRecord,
    DispatchTarget, FactoryRegistry, ManagerConfig, ManagerEvent, Message, MessageBody,
    MessageKind, PeerRequestOutcome, Platform, Result, SwitchyardError, TimeSource, Timestamp,
};

/// Opaque kind that makes a `Recorder` fail its dispatch
pub const FAIL_TAG: u32 = 0xdead;

/// Opaque kind an `Echo` answers with
pub const PONG_TAG: u32 = 0x0f0f;

// ----------------------------------------------------------------------------
// Mock Time Source
// ----------------------------------------------------------------------------

/// Mock time source for deterministic testing
///
/// Starts at 1ms since a zero timestamp is the due-now sentinel.
#[derive(Debug, Clone)]
pub struct MockTimeSource {
    current_time: Arc<AtomicU64>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self::new_at(1)
    }

    pub fn new_at(start_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time)),
        }
    }

    /// Advance time by the specified number of milliseconds
    pub fn advance(&self, millis: u64) {
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::SeqCst);
    }

    pub fn current_time(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current_time.load(Ordering::SeqCst) as f64)
    }
}

// ----------------------------------------------------------------------------
// Journal
// ----------------------------------------------------------------------------

/// One message as seen by a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seen {
    pub component: Address,
    pub src: Address,
    pub dst: Address,
    pub kind: MessageKind,
}

/// Everything the recording components saw
#[derive(Debug, Default)]
pub struct JournalState {
    pub seen: Vec<Seen>,
    pub disconnected_channels: Vec<Address>,
    pub destroyed: Vec<Address>,
}

pub type Journal = Rc<RefCell<JournalState>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(JournalState::default()))
}

/// Kinds seen, in dispatch order
pub fn kinds(journal: &Journal) -> Vec<MessageKind> {
    journal.borrow().seen.iter().map(|seen| seen.kind).collect()
}

// ----------------------------------------------------------------------------
// Components
// ----------------------------------------------------------------------------

/// Records every message; fails on `FAIL_TAG`
pub struct Recorder {
    address: Address,
    journal: Journal,
}

impl Recorder {
    pub fn new(address: Address, journal: Journal) -> Self {
        Self { address, journal }
    }
}

impl Component for Recorder {
    fn dispatch(&mut self, message: Message, _ctx: &mut Context<'_>) -> Result<()> {
        self.journal.borrow_mut().seen.push(Seen {
            component: self.address,
            src: message.src,
            dst: message.dst,
            kind: message.kind(),
        });
        match message.body {
            MessageBody::Opaque { kind: FAIL_TAG, .. } => {
                Err(SwitchyardError::generic("recorder asked to fail"))
            }
            _ => Ok(()),
        }
    }

    fn disconnect_messenger(&mut self, channel: Address) -> Result<()> {
        self.journal.borrow_mut().disconnected_channels.push(channel);
        Ok(())
    }

    fn on_destroy(&mut self, address: Address) {
        self.journal.borrow_mut().destroyed.push(address);
    }
}

/// Answers every opaque message with `PONG_TAG` and the same payload
pub struct Echo {
    journal: Journal,
    address: Address,
}

impl Echo {
    pub fn new(address: Address, journal: Journal) -> Self {
        Self { journal, address }
    }
}

impl Component for Echo {
    fn dispatch(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<()> {
        self.journal.borrow_mut().seen.push(Seen {
            component: self.address,
            src: message.src,
            dst: message.dst,
            kind: message.kind(),
        });
        match &message.body {
            MessageBody::Opaque { payload, .. } => {
                let body = MessageBody::opaque(PONG_TAG, payload.clone());
                ctx.reply(&message, body)
            }
            MessageBody::Disconnected => ctx.destroy(ctx.address()),
            _ => Ok(()),
        }
    }

    fn disconnect_messenger(&mut self, channel: Address) -> Result<()> {
        self.journal.borrow_mut().disconnected_channels.push(channel);
        Ok(())
    }

    fn on_destroy(&mut self, address: Address) {
        self.journal.borrow_mut().destroyed.push(address);
    }
}

/// Component driven by a closure
pub struct Scripted<F> {
    script: F,
}

impl<F> Scripted<F>
where
    F: FnMut(Message, &mut Context<'_>) -> Result<()>,
{
    pub fn new(script: F) -> Self {
        Self { script }
    }
}

impl<F> Component for Scripted<F>
where
    F: FnMut(Message, &mut Context<'_>) -> Result<()>,
{
    fn dispatch(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<()> {
        (self.script)(message, ctx)
    }
}

/// Runs a nested slice for every opaque message it gets
///
/// `lost_while_running` holds how many lost channels the journal knew about
/// when the last dispatch was about to return.
pub struct Nester {
    address: Address,
    journal: Journal,
    lost_while_running: Rc<Cell<Option<usize>>>,
}

impl Component for Nester {
    fn dispatch(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<()> {
        if let MessageBody::Opaque { .. } = message.body {
            ctx.run_nested(BUDGET);
            let lost = self.journal.borrow().disconnected_channels.len();
            self.lost_while_running.set(Some(lost));
        }
        Ok(())
    }

    fn disconnect_messenger(&mut self, channel: Address) -> Result<()> {
        self.journal.borrow_mut().disconnected_channels.push(channel);
        Ok(())
    }

    fn on_destroy(&mut self, address: Address) {
        debug_assert_eq!(address, self.address);
        self.journal.borrow_mut().destroyed.push(address);
    }
}

/// Component type served by `nesting_factory`
pub const NESTING: ComponentType = ComponentType::Custom(9);

/// `recording_factory` plus `Nester` for `NESTING`
pub fn nesting_factory(journal: &Journal) -> (FactoryRegistry, Rc<Cell<Option<usize>>>) {
    let lost_while_running: Rc<Cell<Option<usize>>> = Rc::default();
    let handle = Rc::clone(&lost_while_running);
    let nester_journal = Rc::clone(journal);
    let factory = recording_factory(journal).with(NESTING, move |address| {
        Ok(Box::new(Nester {
            address,
            journal: Rc::clone(&nester_journal),
            lost_while_running: Rc::clone(&lost_while_running),
        }) as Box<dyn Component>)
    });
    (factory, handle)
}

/// Factory building `Recorder` for `Test` and `Echo` for `Plugin`
pub fn recording_factory(journal: &Journal) -> FactoryRegistry {
    let recorder_journal = Rc::clone(journal);
    let echo_journal = Rc::clone(journal);
    FactoryRegistry::new()
        .with(ComponentType::Test, move |address| {
            Ok(Box::new(Recorder::new(address, Rc::clone(&recorder_journal))) as Box<dyn Component>)
        })
        .with(ComponentType::Plugin, move |address| {
            Ok(Box::new(Echo::new(address, Rc::clone(&echo_journal))) as Box<dyn Component>)
        })
}

// ----------------------------------------------------------------------------
// Recording Platform
// ----------------------------------------------------------------------------

/// What a `RecordingPlatform` was asked to do
#[derive(Debug, Default)]
pub struct PlatformLog {
    pub sent: Vec<Message>,
    pub wakes: Vec<Duration>,
    pub peer_requests: Vec<(i32, Address, ComponentType)>,
    pub created: Vec<Address>,
    pub destroyed: Vec<Address>,
    /// Answer for the next peer requests; `None` fails them
    pub peer_answer: Option<PeerRequestOutcome>,
}

pub type PlatformHandle = Rc<RefCell<PlatformLog>>;

/// Platform that keeps everything it is given
pub struct RecordingPlatform {
    log: PlatformHandle,
}

impl RecordingPlatform {
    pub fn new() -> (Self, PlatformHandle) {
        let log = Rc::new(RefCell::new(PlatformLog {
            peer_answer: Some(PeerRequestOutcome::Local),
            ..PlatformLog::default()
        }));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl Platform for RecordingPlatform {
    fn send(&mut self, message: Message) -> Result<()> {
        self.log.borrow_mut().sent.push(message);
        Ok(())
    }

    fn request_run_slice(&mut self, delay: Duration) {
        self.log.borrow_mut().wakes.push(delay);
    }

    fn request_peer(
        &mut self,
        local_manager: i32,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<PeerRequestOutcome> {
        let mut log = self.log.borrow_mut();
        log.peer_requests.push((local_manager, requester, component_type));
        log.peer_answer
            .ok_or_else(|| SwitchyardError::no_such_resource("no peer host"))
    }

    fn on_component_created(&mut self, address: Address) {
        self.log.borrow_mut().created.push(address);
    }

    fn on_component_destroyed(&mut self, address: Address) {
        self.log.borrow_mut().destroyed.push(address);
    }
}

// ----------------------------------------------------------------------------
// Recording Observer
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ObserverLog {
    pub before: Vec<(MessageKind, DispatchTarget)>,
    pub after: Vec<(DispatchRecord, bool)>,
    pub events: Vec<ManagerEvent>,
}

pub type ObserverHandle = Rc<RefCell<ObserverLog>>;

pub struct RecordingObserver {
    log: ObserverHandle,
}

impl RecordingObserver {
    pub fn new() -> (Self, ObserverHandle) {
        let log = Rc::new(RefCell::new(ObserverLog::default()));
        (Self { log: Rc::clone(&log) }, log)
    }
}

impl DispatchObserver for RecordingObserver {
    fn before_dispatch(&mut self, message: &Message, target: DispatchTarget) {
        self.log.borrow_mut().before.push((message.kind(), target));
    }

    fn after_dispatch(&mut self, record: &DispatchRecord, outcome: &Result<()>) {
        self.log.borrow_mut().after.push((*record, outcome.is_ok()));
    }

    fn event(&mut self, _manager: i32, event: &ManagerEvent) {
        self.log.borrow_mut().events.push(*event);
    }
}

// ----------------------------------------------------------------------------
// Manager Helpers
// ----------------------------------------------------------------------------

/// A generous budget; the mock clock does not move during a slice anyway
pub const BUDGET: Duration = Duration::from_millis(1_000);

/// Manager with a mock clock, recording factory and testing config
pub fn manager(number: i32, clock: &MockTimeSource, journal: &Journal) -> ComponentManager {
    ComponentManager::builder(number)
        .with_config(ManagerConfig::testing())
        .with_time_source(clock.clone())
        .with_factory(recording_factory(journal))
        .build()
        .expect("manager should build")
}

pub fn opaque(src: Address, dst: Address, tag: u32) -> Message {
    Message::new(src, dst, MessageBody::opaque(tag, tag.to_be_bytes().to_vec()))
}
