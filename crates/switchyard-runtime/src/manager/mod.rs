//! The component manager
//!
//! One `ComponentManager` exists per thread (or process). It owns the inbox,
//! the component registry, the filter set and, on the root manager, the peer
//! set. Only the owning thread touches it; other managers are reached through
//! the `Platform` with encoded frames.
//!
//! The implementation is split by concern:
//! - `dispatch`: the slice loop and message routing
//! - `lifecycle`: component creation, destruction and channels
//! - `peers`: connect/disconnect protocol between managers

mod dispatch;
mod lifecycle;
mod peers;

use core::time::Duration;
use std::collections::BTreeSet;

use smallvec::SmallVec;
use tracing::{debug, warn};

use switchyard_core::{
    codec, millis_to_duration, Address, ComponentType, FilterId, FilterSet, Inbox, ManagerConfig,
    Message, MessageBody, MessageFilter, Result, SwitchyardError, TimeSource, Timestamp,
};

use crate::builder::ManagerBuilder;
use crate::component::ComponentFactory;
use crate::diagnostics::{DispatchObserver, ManagerEvent, ManagerStats};
use crate::platform::{Messenger, Platform, SendFlags};
use crate::registry::ComponentRegistry;

/// Callback receiving manager-addressed messages the protocol does not consume
pub type ManagerHook = Box<dyn FnMut(&Message)>;

// ----------------------------------------------------------------------------
// Component Manager
// ----------------------------------------------------------------------------

/// Per-thread message router and component lifecycle authority
pub struct ComponentManager {
    number: i32,
    config: ManagerConfig,
    time_source: Box<dyn TimeSource>,
    platform: Option<Box<dyn Platform>>,
    factory: Box<dyn ComponentFactory>,
    observer: Option<Box<dyn DispatchObserver>>,
    hook: Option<ManagerHook>,
    inbox: Inbox,
    filters: FilterSet,
    registry: ComponentRegistry,
    /// Component numbers currently being dispatched to, innermost last
    running: SmallVec<[i32; 4]>,
    /// Root only: connected manager numbers
    peers: BTreeSet<i32>,
    /// Root only: component addresses announced to this manager
    directory: BTreeSet<Address>,
    root_connected: bool,
    /// Non-root only: the root said goodbye (or was reported gone)
    root_lost: bool,
    announced: bool,
    stats: ManagerStats,
}

impl ComponentManager {
    /// Start building manager `number` (0 is the root)
    pub fn builder(number: i32) -> ManagerBuilder {
        ManagerBuilder::new(number)
    }

    pub(crate) fn from_parts(
        number: i32,
        config: ManagerConfig,
        time_source: Box<dyn TimeSource>,
        platform: Option<Box<dyn Platform>>,
        factory: Box<dyn ComponentFactory>,
        observer: Option<Box<dyn DispatchObserver>>,
        hook: Option<ManagerHook>,
    ) -> Self {
        Self {
            number,
            config,
            time_source,
            platform,
            factory,
            observer,
            hook,
            inbox: Inbox::new(),
            filters: FilterSet::new(),
            registry: ComponentRegistry::new(number),
            running: SmallVec::new(),
            peers: BTreeSet::new(),
            directory: BTreeSet::new(),
            root_connected: number == 0,
            root_lost: false,
            announced: false,
            stats: ManagerStats::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn number(&self) -> i32 {
        self.number
    }

    /// This manager's own address `(m,0,0)`
    pub fn address(&self) -> Address {
        Address::manager(self.number)
    }

    pub fn is_root(&self) -> bool {
        self.number == 0
    }

    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }

    pub fn has_platform(&self) -> bool {
        self.platform.is_some()
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn pending_messages(&self) -> usize {
        self.inbox.len()
    }

    /// Whether the root manager is known to be reachable
    pub fn is_root_connected(&self) -> bool {
        self.root_connected
    }

    pub fn has_peer(&self, manager: i32) -> bool {
        self.peers.contains(&manager)
    }

    pub fn peers(&self) -> impl Iterator<Item = i32> + '_ {
        self.peers.iter().copied()
    }

    /// Component addresses announced to the root
    pub fn directory(&self) -> impl Iterator<Item = Address> + '_ {
        self.directory.iter().copied()
    }

    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether `address` names a live local component
    pub fn has_component(&self, address: Address) -> bool {
        address.manager == self.number
            && address.is_component()
            && self.registry.contains(address.component)
            && !self.registry.is_doomed(address.component)
    }

    pub fn components(&self) -> Vec<Address> {
        self.registry
            .numbers()
            .into_iter()
            .map(|number| Address::component(self.number, number))
            .collect()
    }

    pub fn component_type(&self, address: Address) -> Option<ComponentType> {
        if address.manager != self.number {
            return None;
        }
        self.registry.component_type(address.component)
    }

    /// Remote endpoint a local channel is bound to
    pub fn channel_remote(&self, channel: Address) -> Option<Address> {
        self.registry.binding(&channel).map(|binding| binding.remote)
    }

    pub fn channel_count(&self) -> usize {
        self.registry.binding_count()
    }

    /// Innermost component currently being dispatched to
    pub fn running_component(&self) -> Option<Address> {
        self.running
            .last()
            .map(|number| Address::component(self.number, *number))
    }

    // ------------------------------------------------------------------------
    // Send / Receive
    // ------------------------------------------------------------------------

    /// Route a message with default flags
    pub fn send(&mut self, message: Message) -> Result<()> {
        self.send_with(message, SendFlags::NONE)
    }

    /// Route a message: local destinations go to the inbox, remote ones to
    /// the platform
    pub fn send_with(&mut self, message: Message, flags: SendFlags) -> Result<()> {
        self.check_message(&message)?;

        if message.dst.manager == self.number {
            return self.receive(message);
        }

        match self.platform.as_mut() {
            Some(platform) => {
                self.stats.messages_forwarded += 1;
                platform.send(message)
            }
            None => {
                self.stats.messages_dropped += 1;
                let (src, dst) = (message.src, message.dst);
                self.notify(ManagerEvent::MessageDropped { src, dst });
                if flags.contains(SendFlags::REPORT_UNREACHABLE) || self.config.report_unreachable {
                    Err(SwitchyardError::no_such_resource(format!(
                        "route to manager {}",
                        dst.manager
                    )))
                } else {
                    warn!(%src, %dst, "no platform configured, dropping remote message");
                    Ok(())
                }
            }
        }
    }

    /// Enqueue a message for local dispatch
    pub fn receive(&mut self, message: Message) -> Result<()> {
        self.check_message(&message)?;

        let now = self.now();
        let outcome = self.inbox.insert(message, now, &self.filters);
        self.stats.messages_received += 1;

        if outcome.unblocked_moved_earlier {
            if let Some(delay) = self.inbox.next_delay(now) {
                self.request_run_slice(millis_to_duration(delay));
            }
        }
        Ok(())
    }

    /// Decode a frame handed over by the platform and enqueue it
    pub fn receive_frame(&mut self, frame: &[u8]) -> Result<()> {
        match codec::decode(frame) {
            Ok(message) => self.receive(message),
            Err(err) => {
                self.stats.frames_rejected += 1;
                warn!(manager = self.number, "rejecting frame: {}", err);
                Err(err)
            }
        }
    }

    /// Answer `original` through the active dispatch
    ///
    /// Fails with `NullPointer` when no component is being dispatched to.
    pub fn reply(&mut self, original: &Message, body: MessageBody) -> Result<()> {
        if self.running.is_empty() {
            return Err(SwitchyardError::null_pointer("active dispatch context"));
        }
        self.send(original.reply(body))
    }

    // ------------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------------

    pub fn add_message_filter<F>(&mut self, filter: F) -> FilterId
    where
        F: MessageFilter + 'static,
    {
        let id = self.filters.add(Box::new(filter));
        self.inbox.refresh(&self.filters);
        debug!(manager = self.number, %id, "filter added");
        id
    }

    /// Unregister a filter; unknown ids are ignored and return false
    pub fn remove_message_filter(&mut self, id: FilterId) -> bool {
        if !self.filters.remove(id) {
            return false;
        }

        if self.filters.is_empty() {
            self.inbox.reset_unblocked_to_head();
            self.request_run_slice(Duration::ZERO);
        } else {
            let before = self.inbox.first_unblocked();
            self.inbox.refresh(&self.filters);
            let after = self.inbox.first_unblocked();
            if after.is_some() && (before.is_none() || after < before) {
                let now = self.now();
                if let Some(delay) = self.inbox.next_delay(now) {
                    self.request_run_slice(millis_to_duration(delay));
                }
            }
        }
        debug!(manager = self.number, %id, "filter removed");
        true
    }

    pub fn has_message_filter(&self, id: FilterId) -> bool {
        self.filters.contains(id)
    }

    // ------------------------------------------------------------------------
    // Purging
    // ------------------------------------------------------------------------

    /// Drop every pending message matching `predicate`
    pub fn remove_messages<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&Message) -> bool,
    {
        self.inbox.remove_matching(&self.filters, predicate)
    }

    /// Take the first pending message, in queue order, matching `predicate`
    pub fn remove_first_message<P>(&mut self, predicate: P) -> Option<Message>
    where
        P: Fn(&Message) -> bool,
    {
        self.inbox.remove_first(&self.filters, predicate)
    }

    // ------------------------------------------------------------------------
    // Internal Helpers
    // ------------------------------------------------------------------------

    /// Reject messages with an unset address or a due-time that never comes
    fn check_message(&mut self, message: &Message) -> Result<()> {
        if !message.is_valid() {
            self.stats.messages_dropped += 1;
            return Err(SwitchyardError::invalid_address(message.src, message.dst));
        }
        if !message.has_finite_due() {
            self.stats.messages_dropped += 1;
            warn!(src = %message.src, dst = %message.dst, due = %message.due, "refusing non-finite due-time");
            return Err(SwitchyardError::invalid_due_time(
                message.src,
                message.dst,
                message.due,
            ));
        }
        Ok(())
    }

    fn request_run_slice(&mut self, delay: Duration) {
        if let Some(platform) = self.platform.as_mut() {
            platform.request_run_slice(delay);
        }
    }

    fn notify(&mut self, event: ManagerEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.event(self.number, &event);
        }
    }

    /// Send where failure is only worth a log line
    fn send_best_effort(&mut self, message: Message) {
        let (src, dst, kind) = (message.src, message.dst, message.kind());
        if let Err(err) = self.send(message) {
            debug!(manager = self.number, %src, %dst, %kind, "best-effort send failed: {}", err);
        }
    }
}

impl Messenger for ComponentManager {
    fn send(&mut self, message: Message, flags: SendFlags) -> Result<()> {
        self.send_with(message, flags)
    }

    fn receive_message(&mut self, message: Message) -> Result<()> {
        self.receive(message)
    }
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManager")
            .field("number", &self.number)
            .field("components", &self.registry.len())
            .field("pending", &self.inbox.len())
            .field("filters", &self.filters)
            .field("peers", &self.peers)
            .field("running", &self.running)
            .finish()
    }
}
