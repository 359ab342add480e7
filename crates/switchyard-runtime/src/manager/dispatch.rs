//! Slice loop and message routing

use core::time::Duration;
use tracing::{debug, info, trace, warn};

use switchyard_core::{
    millis_to_duration, Address, ComponentType, Message, MessageBody, Result, SwitchyardError,
};

use super::ComponentManager;
use crate::context::Context;
use crate::diagnostics::{DispatchRecord, DispatchTarget, ManagerEvent};
use crate::platform::PeerRequestOutcome;

impl ComponentManager {
    // ------------------------------------------------------------------------
    // Slice Loop
    // ------------------------------------------------------------------------

    /// Dispatch ready messages until none is ready or `budget` is spent
    ///
    /// Returns the delay until the next deliverable message is due, or `None`
    /// when nothing deliverable is pending. Errors raised while handling a
    /// message never escape; they turn into a status notice to its sender.
    pub fn run_slice(&mut self, budget: Duration) -> Option<Duration> {
        self.announce_to_root();

        let started = self.now();
        let budget_ms = budget.as_secs_f64() * 1000.0;
        let mut dispatched = 0usize;

        loop {
            let now = self.now();
            let number = self.number;
            let running = &self.running;
            let busy = |message: &Message| {
                message.dst.manager == number && running.contains(&message.dst.component)
            };

            let Some(message) = self.inbox.pop_ready(now, &self.filters, busy) else {
                break;
            };

            self.dispatch_logged(message);
            dispatched += 1;

            if self.now() - started > budget_ms {
                trace!(manager = self.number, dispatched, "slice budget spent");
                break;
            }
        }

        self.stats.slices_run += 1;
        let next = self.inbox.next_delay(self.now()).map(millis_to_duration);
        self.notify(ManagerEvent::SliceFinished { dispatched, next });
        next
    }

    /// Run a slice with the configured budget
    pub fn run_default_slice(&mut self) -> Option<Duration> {
        let budget = self.config.slice_budget();
        self.run_slice(budget)
    }

    /// First-slice announcement of a non-root manager
    fn announce_to_root(&mut self) {
        if self.announced {
            return;
        }
        self.announced = true;

        if self.is_root() || !self.config.announce_to_root {
            return;
        }

        let hello = Message::new(self.address(), Address::ROOT, MessageBody::Connected);
        match self.send(hello) {
            Ok(()) => {
                info!(manager = self.number, "announced to root");
                self.notify(ManagerEvent::Announced {
                    manager: self.number,
                });
            }
            Err(err) => warn!(manager = self.number, "announcement to root failed: {}", err),
        }
    }

    /// Dispatch one message, turning failures into a notice to the sender
    fn dispatch_logged(&mut self, message: Message) {
        let (src, dst, body_kind) = (message.src, message.dst, message.kind());
        let answerable = !matches!(
            message.body,
            MessageBody::Status { .. } | MessageBody::Disconnected
        );

        if let Err(err) = self.dispatch_message(message) {
            self.stats.dispatch_failures += 1;
            warn!(manager = self.number, %src, %dst, kind = %body_kind, "dispatch failed: {}", err);

            if answerable && src != dst {
                let notice = Message::new(
                    dst,
                    src,
                    MessageBody::Status {
                        code: err.kind().into(),
                    },
                );
                self.send_best_effort(notice);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    /// Route one dequeued message to manager-level processing or a component
    pub fn dispatch_message(&mut self, message: Message) -> Result<()> {
        if !message.is_valid() {
            return Err(SwitchyardError::invalid_address(message.src, message.dst));
        }

        if message.dst.manager != self.number {
            debug!(manager = self.number, dst = %message.dst, "relaying message");
            return self.send(message);
        }

        if message.dst.is_component_manager() {
            return self.dispatch_to_manager(message);
        }

        self.dispatch_to_component(message)
    }

    fn dispatch_to_manager(&mut self, message: Message) -> Result<()> {
        let record = DispatchRecord {
            src: message.src,
            dst: message.dst,
            kind: message.kind(),
            target: DispatchTarget::Manager,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.before_dispatch(&message, DispatchTarget::Manager);
        }

        self.stats.messages_dispatched += 1;
        let outcome = self.process_manager_message(message);

        if let Some(observer) = self.observer.as_mut() {
            observer.after_dispatch(&record, &outcome);
        }
        outcome
    }

    fn dispatch_to_component(&mut self, message: Message) -> Result<()> {
        let dst = message.dst;
        let number = dst.component;

        if number <= 0 || !self.registry.contains(number) || self.registry.is_doomed(number) {
            self.destination_gone(message);
            return Ok(());
        }

        if self.running.contains(&number) {
            // Reached only through a direct call while the component runs
            debug!(manager = self.number, %dst, "component busy, requeueing");
            return self.receive(message);
        }

        if dst.is_channel() && self.registry.binding(&dst).is_none() {
            let claimed = self
                .registry
                .instance(number)
                .map_or(false, |component| component.address_exists(dst));
            if !claimed {
                self.destination_gone(message);
                return Ok(());
            }
        }

        let Some(mut instance) = self.registry.take_instance(number) else {
            return Err(SwitchyardError::null_pointer(format!("instance of {}", dst)));
        };

        // The remote end of a bound channel went away
        if matches!(message.body, MessageBody::Disconnected) {
            let src = message.src;
            if let Some(binding) = self.registry.binding(&dst).copied() {
                if src.covers(&binding.remote) {
                    self.registry.unbind(&dst);
                    self.stats.channels_closed += 1;
                    if let Err(err) = instance.disconnect_messenger(dst) {
                        debug!(channel = %dst, "disconnect_messenger failed: {}", err);
                    }
                    self.notify(ManagerEvent::ChannelClosed {
                        channel: dst,
                        remote: binding.remote,
                    });
                }
            }
        }

        let component = dst.to_component();
        let target = DispatchTarget::Component(component);
        let record = DispatchRecord {
            src: message.src,
            dst,
            kind: message.kind(),
            target,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.before_dispatch(&message, target);
        }

        self.stats.messages_dispatched += 1;
        self.running.push(number);
        let outcome = {
            let mut ctx = Context::new(self, component);
            instance.dispatch(message, &mut ctx)
        };
        self.running.pop();

        if let Some(observer) = self.observer.as_mut() {
            observer.after_dispatch(&record, &outcome);
        }

        // Channels torn down while the component was checked out
        for channel in self.registry.take_pending_disconnects(number) {
            if let Err(err) = instance.disconnect_messenger(channel) {
                debug!(%channel, "disconnect_messenger failed: {}", err);
            }
        }

        // No farewell to a root that is already gone
        if self.registry.is_doomed(number) {
            let notify_root = !self.root_lost;
            self.finalize_destroy(number, Some(instance), notify_root);
        } else {
            self.registry.restore_instance(number, instance);
        }
        outcome
    }

    /// The destination vanished: drop and tell the sender
    fn destination_gone(&mut self, message: Message) {
        let (src, dst) = (message.src, message.dst);
        debug!(manager = self.number, %src, %dst, kind = %message.kind(), "destination gone");
        self.stats.messages_dropped += 1;
        self.notify(ManagerEvent::MessageDropped { src, dst });

        let answerable = !matches!(
            message.body,
            MessageBody::Disconnected | MessageBody::Status { .. }
        );
        if answerable && src != dst {
            self.send_best_effort(Message::new(dst, src, MessageBody::Disconnected));
        }
    }

    // ------------------------------------------------------------------------
    // Manager-Level Protocol
    // ------------------------------------------------------------------------

    fn process_manager_message(&mut self, message: Message) -> Result<()> {
        match message.body {
            MessageBody::Connected => self.handle_connected(message.src),
            MessageBody::Disconnected => self.handle_disconnected(message.src),
            MessageBody::CreateComponent { component_type } => {
                self.handle_create_request(message.src, component_type)
            }
            MessageBody::ConnectionPending
            | MessageBody::Status { .. }
            | MessageBody::Opaque { .. } => {
                debug!(manager = self.number, %message, "manager message");
                if let Some(hook) = self.hook.as_mut() {
                    hook(&message);
                }
                Ok(())
            }
        }
    }

    fn handle_create_request(
        &mut self,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<()> {
        let local_manager = self.number;
        let outcome = match self.platform.as_mut() {
            Some(platform) => platform.request_peer(local_manager, requester, component_type),
            None => Ok(PeerRequestOutcome::Local),
        };

        match outcome {
            Ok(PeerRequestOutcome::Local) => self
                .handle_peer_request(requester, component_type)
                .map(|_| ()),
            Ok(PeerRequestOutcome::Spawned(peer)) => {
                info!(manager = self.number, %requester, peer, "{} component requested from new peer", component_type);
                let pending = Message::new(self.address(), requester, MessageBody::ConnectionPending);
                self.send(pending)
            }
            Err(err) => {
                warn!(manager = self.number, %requester, "peer request failed: {}", err);
                let status = Message::new(
                    self.address(),
                    requester,
                    MessageBody::Status {
                        code: err.kind().into(),
                    },
                );
                self.send_best_effort(status);
                Ok(())
            }
        }
    }
}
