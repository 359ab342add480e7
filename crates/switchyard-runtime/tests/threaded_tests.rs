//! End-to-end test of managers on separate threads
//!
//! The root requests an echo component; the switchboard spawner starts a
//! worker manager thread to host it. The root pings it over the bound
//! channel, hangs up, and waits for the worker to leave.

mod test_utils;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use switchyard_runtime::{
    Component, ComponentManager, ComponentType, Context, EventLoop, FactoryRegistry, ManagerConfig,
    Message, MessageBody, PeerLaunch, Result, Switchboard,
};
use test_utils::*;

const POLL: Duration = Duration::from_millis(10);

fn run_worker(number: i32, board: Switchboard, launch: PeerLaunch) -> Result<()> {
    let (platform, inbound) = board.register(number)?;
    let journal = journal();
    let mut manager = ComponentManager::builder(number)
        .with_config(ManagerConfig::testing())
        .with_platform(platform)
        .with_factory(recording_factory(&journal))
        .build()?;
    manager.handle_peer_request(launch.requester, launch.component_type)?;

    let mut event_loop = EventLoop::new(manager, inbound);
    event_loop.run_until(POLL, |manager| manager.component_count() == 0)?;
    event_loop.into_manager().shutdown();
    Ok(())
}

#[test]
fn test_ping_through_spawned_worker() {
    let board = Switchboard::new();
    let workers: Arc<Mutex<Vec<JoinHandle<Result<()>>>>> = Arc::default();

    let started = Arc::clone(&workers);
    board.set_spawner(move |board: &Switchboard, launch: PeerLaunch| {
        let handle = board.spawn_numbered(launch.manager, move |number, board| {
            run_worker(number, board, launch)
        })?;
        if let Ok(mut handles) = started.lock() {
            handles.push(handle);
        }
        Ok(())
    });

    let ponged = Rc::new(Cell::new(false));
    let script_ponged = Rc::clone(&ponged);
    let factory = FactoryRegistry::new().with(ComponentType::Test, move |_| {
        let ponged = Rc::clone(&script_ponged);
        Ok(Box::new(Scripted::new(move |message: Message, ctx: &mut Context<'_>| {
            match message.body {
                MessageBody::Connected if message.src.is_channel() => ctx.send(Message::new(
                    ctx.address(),
                    message.src,
                    MessageBody::opaque(1, b"ping".to_vec()),
                )),
                MessageBody::Opaque { kind: PONG_TAG, .. } => {
                    ponged.set(true);
                    ctx.send(Message::new(ctx.address(), message.src, MessageBody::Disconnected))
                }
                _ => Ok(()),
            }
        })) as Box<dyn Component>)
    });

    let (platform, inbound) = board.register(0).unwrap();
    let root = ComponentManager::builder(0)
        .with_config(ManagerConfig::testing())
        .with_platform(platform)
        .with_factory(factory)
        .build()
        .unwrap();
    let mut event_loop = EventLoop::new(root, inbound);

    let pinger = event_loop
        .manager_mut()
        .create_component(ComponentType::Test)
        .unwrap();
    event_loop
        .manager_mut()
        .request_component(pinger, ComponentType::Plugin)
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let done = Rc::clone(&ponged);
    event_loop
        .run_until(POLL, |manager| {
            (done.get() && manager.stats().peers_lost == 1) || Instant::now() > deadline
        })
        .unwrap();

    let root = event_loop.into_manager();
    assert!(ponged.get(), "pong never arrived");
    assert_eq!(root.stats().peers_connected, 1);
    assert_eq!(root.stats().peers_lost, 1);
    assert_eq!(root.peers().count(), 0);
    assert_eq!(root.directory().filter(|entry| entry.manager == 1).count(), 0);

    let handles = std::mem::take(&mut *workers.lock().unwrap());
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.join().expect("worker thread panicked").unwrap();
    }
    assert_eq!(board.managers(), vec![0]);
}
