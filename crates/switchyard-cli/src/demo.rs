//! Threaded ping/echo demonstration
//!
//! The root manager hosts a pinger. For every worker it asks the root for an
//! echo component; the switchboard spawner answers each request by starting
//! a worker manager thread that hosts the echo. The pinger exchanges a fixed
//! number of pings with every echo and then hangs up. An echo destroys itself
//! when the pinger hangs up, its worker shuts down, and the root sees the
//! peer leave.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, info, warn};

use switchyard_core::{Address, ComponentType, ManagerConfig, Message, MessageBody};
use switchyard_runtime::{
    Component, ComponentManager, Context, EventLoop, FactoryRegistry, ManagerStats, PeerLaunch,
    Switchboard,
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Opaque kind of a ping
pub const PING: u32 = 0x5049;

/// Opaque kind of a pong
pub const PONG: u32 = 0x504f;

type WorkerHandles = Arc<Mutex<Vec<JoinHandle<switchyard_core::Result<()>>>>>;
type WorkerReports = Arc<Mutex<Vec<WorkerReport>>>;

// ----------------------------------------------------------------------------
// Reports
// ----------------------------------------------------------------------------

/// Final counters of one worker manager
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub manager: i32,
    pub stats: ManagerStats,
}

/// Outcome of a demo run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub workers: usize,
    pub pings_per_worker: u32,
    pub pongs: u32,
    pub completed: usize,
    pub refused: usize,
    pub elapsed_ms: u64,
    pub root: ManagerStats,
    pub worker_reports: Vec<WorkerReport>,
}

// ----------------------------------------------------------------------------
// Components
// ----------------------------------------------------------------------------

/// Answers pings; leaves when its peer hangs up
struct Echo;

impl Component for Echo {
    fn dispatch(
        &mut self,
        message: Message,
        ctx: &mut Context<'_>,
    ) -> switchyard_core::Result<()> {
        match &message.body {
            MessageBody::Opaque { kind: PING, payload } => {
                let body = MessageBody::opaque(PONG, payload.clone());
                ctx.reply(&message, body)
            }
            MessageBody::Disconnected => {
                debug!(echo = %ctx.address(), "peer hung up");
                ctx.destroy(ctx.address())
            }
            _ => {
                debug!(echo = %ctx.address(), "ignoring {}", message);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
struct PingerState {
    rounds: BTreeMap<Address, u32>,
    pongs: u32,
    completed: usize,
    refused: usize,
}

/// Pings every echo it gets connected to
struct Pinger {
    state: Rc<RefCell<PingerState>>,
    pings: u32,
    interval: Duration,
}

impl Pinger {
    fn ping(
        &self,
        ctx: &mut Context<'_>,
        channel: Address,
        round: u32,
    ) -> switchyard_core::Result<()> {
        let body = MessageBody::opaque(PING, round.to_be_bytes().to_vec());
        if round == 0 || self.interval.is_zero() {
            ctx.send(Message::new(ctx.address(), channel, body))
        } else {
            ctx.send_after(channel, self.interval, body)
        }
    }
}

impl Component for Pinger {
    fn dispatch(
        &mut self,
        message: Message,
        ctx: &mut Context<'_>,
    ) -> switchyard_core::Result<()> {
        let src = message.src;
        match message.body {
            MessageBody::Connected if src.is_channel() => {
                info!(channel = %src, "echo connected");
                self.state.borrow_mut().rounds.insert(src, 0);
                self.ping(ctx, src, 0)
            }
            MessageBody::ConnectionPending => {
                debug!("worker manager starting");
                Ok(())
            }
            MessageBody::Opaque { kind: PONG, .. } => {
                let round = {
                    let mut state = self.state.borrow_mut();
                    state.pongs += 1;
                    let round = state.rounds.entry(src).or_insert(0);
                    *round += 1;
                    *round
                };

                if round < self.pings {
                    return self.ping(ctx, src, round);
                }
                info!(channel = %src, rounds = round, "echo done, hanging up");
                self.state.borrow_mut().completed += 1;
                ctx.send(Message::new(ctx.address(), src, MessageBody::Disconnected))
            }
            MessageBody::Status { code } => {
                warn!(from = %src, ?code, "component request failed");
                self.state.borrow_mut().refused += 1;
                Ok(())
            }
            MessageBody::Disconnected => {
                debug!(channel = %src, "echo gone");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ----------------------------------------------------------------------------
// Workers
// ----------------------------------------------------------------------------

fn run_worker(
    number: i32,
    board: Switchboard,
    launch: PeerLaunch,
    config: ManagerConfig,
    trace_dispatch: bool,
    poll: Duration,
) -> switchyard_core::Result<ManagerStats> {
    let (platform, inbound) = board.register(number)?;
    let factory = FactoryRegistry::new().with(ComponentType::Plugin, |_| {
        Ok(Box::new(Echo) as Box<dyn Component>)
    });

    let mut builder = ComponentManager::builder(number)
        .with_config(config)
        .with_platform(platform)
        .with_factory(factory);
    if trace_dispatch {
        builder = builder.with_tracing();
    }
    let mut manager = builder.build()?;

    let channel = manager.handle_peer_request(launch.requester, launch.component_type)?;
    info!(manager = number, %channel, requester = %launch.requester, "worker serving");

    // Losing the root also empties the manager, so this ends either way
    let mut event_loop = EventLoop::new(manager, inbound);
    event_loop.run_until(poll, |manager| manager.component_count() == 0)?;

    let mut manager = event_loop.into_manager();
    manager.shutdown();
    Ok(manager.stats().clone())
}

fn install_spawner(
    board: &Switchboard,
    config: &AppConfig,
    reports: &WorkerReports,
    handles: &WorkerHandles,
) {
    let manager_config = config.manager.clone();
    let trace_dispatch = config.logging.trace_dispatch;
    let poll = Duration::from_millis(config.demo.poll_ms);
    let reports = Arc::clone(reports);
    let handles = Arc::clone(handles);

    board.set_spawner(move |board: &Switchboard, launch: PeerLaunch| {
        let worker_config = manager_config.clone();
        let reports = Arc::clone(&reports);
        let handle = board.spawn_numbered(launch.manager, move |number, board| {
            let stats = run_worker(number, board, launch, worker_config, trace_dispatch, poll)?;
            if let Ok(mut reports) = reports.lock() {
                reports.push(WorkerReport {
                    manager: number,
                    stats,
                });
            }
            Ok(())
        })?;

        match handles.lock() {
            Ok(mut handles) => handles.push(handle),
            Err(_) => warn!(manager = launch.manager, "worker list poisoned, detaching thread"),
        }
        Ok(())
    });
}

// ----------------------------------------------------------------------------
// Demo Driver
// ----------------------------------------------------------------------------

/// Run the ping/echo topology to completion
pub fn run_demo(config: &AppConfig) -> Result<DemoReport> {
    let demo = &config.demo;
    let board = Switchboard::new();
    let reports: WorkerReports = Arc::default();
    let handles: WorkerHandles = Arc::default();
    install_spawner(&board, config, &reports, &handles);

    let state: Rc<RefCell<PingerState>> = Rc::default();
    let pinger_state = Rc::clone(&state);
    let pings = demo.pings;
    let interval = Duration::from_millis(demo.interval_ms);
    let factory = FactoryRegistry::new().with(ComponentType::Singleton, move |_| {
        Ok(Box::new(Pinger {
            state: Rc::clone(&pinger_state),
            pings,
            interval,
        }) as Box<dyn Component>)
    });

    let (platform, inbound) = board.register(0)?;
    let mut builder = ComponentManager::builder(0)
        .with_config(config.manager.clone())
        .with_platform(platform)
        .with_factory(factory);
    if config.logging.trace_dispatch {
        builder = builder.with_tracing();
    }
    let mut event_loop = EventLoop::new(builder.build()?, inbound);

    let pinger = event_loop
        .manager_mut()
        .create_component(ComponentType::Singleton)?;
    for _ in 0..demo.workers {
        event_loop
            .manager_mut()
            .request_component(pinger, ComponentType::Plugin)?;
    }
    info!(workers = demo.workers, pings = demo.pings, "demo started");

    let started = Instant::now();
    let deadline = started + Duration::from_secs(demo.timeout_secs);
    let settled = |manager: &ComponentManager, state: &PingerState| {
        state.completed + state.refused >= demo.workers
            && manager.stats().peers_lost >= state.completed as u64
            && manager.peers().next().is_none()
    };

    let progress = Rc::clone(&state);
    event_loop.run_until(Duration::from_millis(demo.poll_ms), |manager| {
        settled(&*manager, &progress.borrow()) || Instant::now() >= deadline
    })?;

    let mut root = event_loop.into_manager();
    if !settled(&root, &state.borrow()) {
        root.shutdown();
        return Err(CliError::Demo(format!(
            "timed out after {}s with {} of {} workers done",
            demo.timeout_secs,
            state.borrow().completed,
            demo.workers
        )));
    }
    root.shutdown();

    let joined = handles
        .lock()
        .map(|mut handles| std::mem::take(&mut *handles))
        .map_err(|_| anyhow!("worker list poisoned"))?;
    for handle in joined {
        let outcome = handle
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))?;
        outcome?;
    }

    let mut worker_reports = reports
        .lock()
        .map(|mut reports| std::mem::take(&mut *reports))
        .map_err(|_| anyhow!("worker reports poisoned"))?;
    worker_reports.sort_by_key(|report| report.manager);

    let state = state.borrow();
    let report = DemoReport {
        workers: demo.workers,
        pings_per_worker: demo.pings,
        pongs: state.pongs,
        completed: state.completed,
        refused: state.refused,
        elapsed_ms: started.elapsed().as_millis() as u64,
        root: root.stats().clone(),
        worker_reports,
    };
    info!(pongs = report.pongs, elapsed_ms = report.elapsed_ms, "demo finished");
    Ok(report)
}
