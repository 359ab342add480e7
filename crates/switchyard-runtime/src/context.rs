//! Dispatch context handed to components
//!
//! A component is checked out of the registry while it runs, so the context
//! can lend out the whole manager without aliasing the component itself.

use core::time::Duration;

use switchyard_core::{
    Address, ComponentType, FilterId, Message, MessageBody, MessageFilter, Result, Timestamp,
};

use crate::manager::ComponentManager;
use crate::platform::{Messenger, SendFlags};

/// Capability a component uses to talk back to its manager
pub struct Context<'a> {
    manager: &'a mut ComponentManager,
    current: Address,
}

impl<'a> Context<'a> {
    pub(crate) fn new(manager: &'a mut ComponentManager, current: Address) -> Self {
        Self { manager, current }
    }

    /// Address of the component being dispatched to
    pub fn address(&self) -> Address {
        self.current
    }

    pub fn manager_number(&self) -> i32 {
        self.manager.number()
    }

    pub fn now(&self) -> Timestamp {
        self.manager.now()
    }

    pub fn send(&mut self, message: Message) -> Result<()> {
        self.manager.send(message)
    }

    pub fn send_with(&mut self, message: Message, flags: SendFlags) -> Result<()> {
        self.manager.send_with(message, flags)
    }

    /// Send `body` from this component to `dst`, due after `delay`
    pub fn send_after(&mut self, dst: Address, delay: Duration, body: MessageBody) -> Result<()> {
        let due = self.now().after(delay);
        self.manager
            .send(Message::delayed(self.current, dst, due, body))
    }

    /// Answer `original` with src and dst swapped
    pub fn reply(&mut self, original: &Message, body: MessageBody) -> Result<()> {
        self.manager.send(original.reply(body))
    }

    pub fn create_component(&mut self, component_type: ComponentType) -> Result<Address> {
        self.manager.create_component(component_type)
    }

    /// Destroy a component; destroying the current one takes effect when
    /// this dispatch returns
    pub fn destroy(&mut self, address: Address) -> Result<()> {
        self.manager.destroy(address)
    }

    /// Open a channel of the current component bound to `remote`
    pub fn open_channel(&mut self, remote: Address) -> Result<Address> {
        self.manager.open_channel(self.current, remote)
    }

    pub fn close_channel(&mut self, channel: Address) -> Result<()> {
        self.manager.close_channel(channel)
    }

    /// Ask the root manager for a component; the answer arrives as a
    /// `Connected` from the new component's channel
    pub fn request_component(&mut self, component_type: ComponentType) -> Result<()> {
        self.manager.request_component(self.current, component_type)
    }

    pub fn add_message_filter<F>(&mut self, filter: F) -> FilterId
    where
        F: MessageFilter + 'static,
    {
        self.manager.add_message_filter(filter)
    }

    pub fn remove_message_filter(&mut self, id: FilterId) -> bool {
        self.manager.remove_message_filter(id)
    }

    /// Run a nested slice; messages for components already running are skipped
    pub fn run_nested(&mut self, budget: Duration) -> Option<Duration> {
        self.manager.run_slice(budget)
    }

    /// Read-only view of the manager
    pub fn manager(&self) -> &ComponentManager {
        &*self.manager
    }
}

impl Messenger for Context<'_> {
    fn send(&mut self, message: Message, flags: SendFlags) -> Result<()> {
        self.manager.send_with(message, flags)
    }

    fn receive_message(&mut self, message: Message) -> Result<()> {
        self.manager.receive(message)
    }
}
