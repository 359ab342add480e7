//! Connect/disconnect protocol between managers
//!
//! The root manager brokers the topology: every other manager announces
//! itself to the root on its first slice, and the root relays the departure
//! of any peer to the remaining ones.

use tracing::{debug, info, warn};

use switchyard_core::{Address, Message, MessageBody, Result, SwitchyardError};

use super::ComponentManager;
use crate::diagnostics::ManagerEvent;

impl ComponentManager {
    /// A `Connected` arrived at this manager's own address
    pub(super) fn handle_connected(&mut self, src: Address) -> Result<()> {
        if !src.is_component_manager() {
            if self.is_root() {
                self.directory.insert(src);
                debug!(component = %src, "component registered with root");
            } else {
                debug!(manager = self.number, %src, "ignoring component announcement");
            }
            return Ok(());
        }

        if src.manager == self.number {
            return Ok(());
        }

        if self.is_root() {
            if self.peers.insert(src.manager) {
                self.stats.peers_connected += 1;
                info!(peer = src.manager, "peer connected");
                self.notify(ManagerEvent::PeerConnected {
                    manager: src.manager,
                });
                self.send_best_effort(Message::new(Address::ROOT, src, MessageBody::Connected));
            } else {
                debug!(peer = src.manager, "duplicate peer announcement");
            }
        } else if src.is_root() {
            self.root_lost = false;
            if !self.root_connected {
                self.root_connected = true;
                self.notify(ManagerEvent::RootConnected);
            }
        } else {
            debug!(manager = self.number, peer = src.manager, "ignoring non-root announcement");
        }
        Ok(())
    }

    /// A `Disconnected` arrived at this manager's own address
    pub(super) fn handle_disconnected(&mut self, src: Address) -> Result<()> {
        if !src.is_component_manager() {
            self.teardown_bindings(|remote| src.covers(remote));
            if self.is_root() {
                self.directory.retain(|entry| !src.covers(entry));
            }
            return Ok(());
        }

        if src.manager == self.number {
            return Ok(());
        }

        if self.is_root() {
            return self.drop_peer(src.manager);
        }

        if src.is_root() {
            self.root_lost();
        } else {
            // Relayed by the root: another peer went away
            self.teardown_bindings(|remote| src.covers(remote));
        }
        Ok(())
    }

    /// The platform noticed that manager `manager` is gone
    ///
    /// Same effect as a `Disconnected` from that manager's address.
    pub fn peer_gone(&mut self, manager: i32) -> Result<()> {
        if manager < 0 {
            return Err(SwitchyardError::invalid_address(
                Address::manager(manager),
                self.address(),
            ));
        }
        warn!(manager = self.number, peer = manager, "peer gone");
        self.handle_disconnected(Address::manager(manager))
    }

    /// Root: forget a peer, relay its departure and cascade the teardown
    fn drop_peer(&mut self, peer: i32) -> Result<()> {
        if !self.peers.remove(&peer) {
            return Err(SwitchyardError::no_such_resource(format!("peer {}", peer)));
        }

        self.stats.peers_lost += 1;
        info!(peer, "peer disconnected");
        self.notify(ManagerEvent::PeerDisconnected { manager: peer });

        let gone = Address::manager(peer);
        let remaining: Vec<i32> = self.peers.iter().copied().collect();
        for other in remaining {
            self.send_best_effort(Message::new(
                gone,
                Address::manager(other),
                MessageBody::Disconnected,
            ));
        }

        self.teardown_bindings(|remote| gone.covers(remote));
        self.directory.retain(|entry| !gone.covers(entry));
        Ok(())
    }

    /// Non-root: the root went away, so every local component goes too
    fn root_lost(&mut self) {
        warn!(manager = self.number, "root disconnected, tearing down components");
        self.root_connected = false;
        self.root_lost = true;
        self.notify(ManagerEvent::RootDisconnected);

        for number in self.registry.numbers() {
            if self.running.contains(&number) {
                self.registry.mark_doomed(number);
                continue;
            }
            let instance = self.registry.take_instance(number);
            self.finalize_destroy(number, instance, false);
        }
    }

    /// Unbind every channel whose remote endpoint matches `predicate`
    fn teardown_bindings<P>(&mut self, predicate: P)
    where
        P: Fn(&Address) -> bool,
    {
        for (channel, binding) in self.registry.unbind_remote(predicate) {
            match self.registry.instance_mut(binding.component) {
                Some(instance) => {
                    if let Err(err) = instance.disconnect_messenger(channel) {
                        debug!(%channel, "disconnect_messenger failed: {}", err);
                    }
                }
                None => {
                    debug!(%channel, "owner is running, deferring disconnect_messenger");
                    self.registry.defer_disconnect(binding.component, channel);
                }
            }
            self.stats.channels_closed += 1;
            self.notify(ManagerEvent::ChannelClosed {
                channel,
                remote: binding.remote,
            });
        }
    }
}
