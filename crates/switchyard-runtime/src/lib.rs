//! Switchyard Runtime Engine
//!
//! This crate contains the dispatch engine built on `switchyard-core`:
//! - `ComponentManager`: inbox, registry, slice loop and peer protocol
//! - `Component` / `ComponentFactory`: the units a manager hosts
//! - `Platform`: the embedding transport the manager delegates to
//! - `EventLoop`: "wait for frames, run a slice" integration
//! - `loopback` and `threaded`: reference platforms

pub mod builder;
pub mod component;
pub mod context;
pub mod diagnostics;
pub mod event_loop;
pub mod loopback;
pub mod manager;
pub mod platform;
mod registry;
pub mod threaded;

pub use builder::ManagerBuilder;
pub use component::{Component, ComponentFactory, FactoryRegistry};
pub use context::Context;
pub use diagnostics::{
    DispatchObserver, DispatchRecord, DispatchTarget, ManagerEvent, ManagerStats, TracingObserver,
};
pub use event_loop::{EventLoop, EventSummary, Inbound, ProcessFlags};
pub use loopback::{LoopbackHub, LoopbackPlatform, PeerPolicy, PlatformNotice};
pub use manager::{ComponentManager, ManagerHook};
pub use platform::{Messenger, PeerLaunch, PeerRequestOutcome, Platform, SendFlags};
pub use registry::ChannelBinding;
pub use threaded::{Spawner, Switchboard, ThreadInbound, ThreadPlatform};

// Re-export core types for convenience
pub use switchyard_core::{
    codec, Address, AddressFilter, ComponentType, ErrorKind, FilterId, KindFilter, ManagerConfig,
    Message, MessageBody, MessageFilter, MessageKind, MonotonicTimeSource, Result, StatusCode,
    SwitchyardError, TimeSource, Timestamp,
};
