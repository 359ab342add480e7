//! Component creation, destruction and channel management

use tracing::{debug, info, warn};

use switchyard_core::{Address, ComponentType, Message, MessageBody, Result, SwitchyardError};

use super::ComponentManager;
use crate::component::Component;
use crate::diagnostics::ManagerEvent;
use crate::registry::ChannelBinding;

impl ComponentManager {
    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Create, register and announce a component
    ///
    /// Every failure unwinds what was already done and is reported as
    /// `OutOfMemory`; the underlying cause is kept in the error context.
    pub fn create_component(&mut self, component_type: ComponentType) -> Result<Address> {
        if !self.config.admits_component(self.registry.len()) {
            return Err(SwitchyardError::out_of_memory(format!(
                "component limit of {} reached",
                self.config.max_components
            )));
        }

        let number = self.registry.allocate_number()?;
        let address = Address::component(self.number, number);

        let instance = self
            .factory
            .create(component_type, address)
            .map_err(|err| {
                SwitchyardError::out_of_memory(format!(
                    "building {} component {}: {}",
                    component_type, address, err
                ))
            })?;
        self.registry.insert(number, component_type, instance);

        if self.is_root() {
            self.directory.insert(address);
        } else if self.config.announce_to_root {
            let hello = Message::new(address, Address::ROOT, MessageBody::Connected);
            if let Err(err) = self.send(hello) {
                if let Some(mut instance) = self.registry.remove(number).and_then(|slot| slot.instance) {
                    instance.on_destroy(address);
                }
                return Err(SwitchyardError::out_of_memory(format!(
                    "announcing component {}: {}",
                    address, err
                )));
            }
        }

        if let Some(platform) = self.platform.as_mut() {
            platform.on_component_created(address);
        }
        self.stats.components_created += 1;
        info!(manager = self.number, %address, "{} component created", component_type);
        self.notify(ManagerEvent::ComponentCreated { address });
        Ok(address)
    }

    /// Service a creation request from another manager
    ///
    /// Creates the component, binds a fresh channel of it to `requester` and
    /// answers `Connected` from that channel. Returns the channel address.
    pub fn handle_peer_request(
        &mut self,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<Address> {
        if !requester.is_valid() {
            return Err(SwitchyardError::invalid_address(requester, self.address()));
        }

        let component = self.create_component(component_type)?;

        let channel = match self.open_channel(component, requester) {
            Ok(channel) => channel,
            Err(err) => {
                self.unwind_component(component);
                return Err(err);
            }
        };

        let connected = Message::new(channel, requester, MessageBody::Connected);
        if let Err(err) = self.send(connected) {
            self.registry.unbind(&channel);
            self.unwind_component(component);
            return Err(err);
        }

        debug!(manager = self.number, %requester, %channel, "peer request served");
        Ok(channel)
    }

    /// Ask the root manager for a component on behalf of `requester`
    pub fn request_component(
        &mut self,
        requester: Address,
        component_type: ComponentType,
    ) -> Result<()> {
        let request = Message::new(
            requester,
            Address::ROOT,
            MessageBody::CreateComponent { component_type },
        );
        self.send(request)
    }

    fn unwind_component(&mut self, component: Address) {
        let number = component.component;
        if self.running.contains(&number) {
            self.registry.mark_doomed(number);
            return;
        }
        let instance = self.registry.take_instance(number);
        self.finalize_destroy(number, instance, true);
    }

    // ------------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------------

    /// Allocate a channel of a local component bound to `remote`
    pub fn open_channel(&mut self, component: Address, remote: Address) -> Result<Address> {
        if !remote.is_valid() {
            return Err(SwitchyardError::invalid_address(component, remote));
        }
        if !self.has_component(component.to_component()) {
            return Err(SwitchyardError::no_such_resource(format!(
                "component {}",
                component
            )));
        }

        let number = component.component;
        let channel = self.registry.allocate_channel(number)?;
        self.registry.bind(
            channel,
            ChannelBinding {
                component: number,
                remote,
            },
        );
        self.stats.channels_opened += 1;
        self.notify(ManagerEvent::ChannelOpened { channel, remote });
        Ok(channel)
    }

    /// Unbind a local channel and tell its remote endpoint
    pub fn close_channel(&mut self, channel: Address) -> Result<()> {
        let binding = self
            .registry
            .unbind(&channel)
            .ok_or_else(|| SwitchyardError::no_such_resource(format!("channel {}", channel)))?;

        match self.registry.instance_mut(binding.component) {
            Some(instance) => {
                if let Err(err) = instance.disconnect_messenger(channel) {
                    debug!(%channel, "disconnect_messenger failed: {}", err);
                }
            }
            None => {
                self.registry.defer_disconnect(binding.component, channel);
            }
        }
        self.stats.channels_closed += 1;
        self.notify(ManagerEvent::ChannelClosed {
            channel,
            remote: binding.remote,
        });
        self.send_best_effort(Message::new(channel, binding.remote, MessageBody::Disconnected));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------------

    /// Destroy a local component
    ///
    /// A component that is currently running is only marked; it is torn down
    /// as soon as its dispatch returns.
    pub fn destroy(&mut self, address: Address) -> Result<()> {
        let number = address.component;
        if address.manager != self.number || number <= 0 || !self.registry.contains(number) {
            return Err(SwitchyardError::no_such_resource(format!(
                "component {}",
                address
            )));
        }

        if self.running.contains(&number) {
            self.registry.mark_doomed(number);
            debug!(manager = self.number, %address, "destroy deferred until dispatch returns");
            return Ok(());
        }

        let instance = self.registry.take_instance(number);
        self.finalize_destroy(number, instance, true);
        Ok(())
    }

    /// Destroy every component and say goodbye to the root
    pub fn shutdown(&mut self) {
        for number in self.registry.numbers() {
            let address = Address::component(self.number, number);
            if let Err(err) = self.destroy(address) {
                warn!(manager = self.number, %address, "shutdown destroy failed: {}", err);
            }
        }

        if !self.is_root() && self.announced && self.config.announce_to_root {
            let farewell = Message::new(self.address(), Address::ROOT, MessageBody::Disconnected);
            self.send_best_effort(farewell);
            self.root_connected = false;
        }
        info!(manager = self.number, "manager shut down");
    }

    /// Remove a component and its channels, then tell everyone who cares
    pub(super) fn finalize_destroy(
        &mut self,
        number: i32,
        instance: Option<Box<dyn Component>>,
        notify_root: bool,
    ) {
        let address = Address::component(self.number, number);
        self.registry.remove(number);
        let bindings = self.registry.unbind_component(number);

        if let Some(mut instance) = instance {
            instance.on_destroy(address);
        }

        for (channel, binding) in bindings {
            self.stats.channels_closed += 1;
            self.notify(ManagerEvent::ChannelClosed {
                channel,
                remote: binding.remote,
            });
            self.send_best_effort(Message::new(channel, binding.remote, MessageBody::Disconnected));
        }

        if self.is_root() {
            self.directory.retain(|entry| !address.covers(entry));
        } else if notify_root && self.config.announce_to_root {
            self.send_best_effort(Message::new(address, Address::ROOT, MessageBody::Disconnected));
        }

        if let Some(platform) = self.platform.as_mut() {
            platform.on_component_destroyed(address);
        }
        self.stats.components_destroyed += 1;
        info!(manager = self.number, %address, "component destroyed");
        self.notify(ManagerEvent::ComponentDestroyed { address });
    }
}
