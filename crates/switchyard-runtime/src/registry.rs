//! Component registry and channel bindings of one manager

use std::collections::BTreeMap;

use switchyard_core::{Address, ComponentType, Result, SwitchyardError};

use crate::component::Component;

// ----------------------------------------------------------------------------
// Registry Entries
// ----------------------------------------------------------------------------

/// A registered component
///
/// `instance` is `None` while the component is being dispatched to.
pub(crate) struct ComponentSlot {
    pub component_type: ComponentType,
    pub instance: Option<Box<dyn Component>>,
    /// Destroy requested while the component was running
    pub doomed: bool,
    /// Channels that lost their remote while the component was running
    pending_disconnects: Vec<Address>,
    next_channel: Option<i32>,
}

/// Local channel bound to a remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    /// Owning component number
    pub component: i32,
    pub remote: Address,
}

// ----------------------------------------------------------------------------
// Component Registry
// ----------------------------------------------------------------------------

pub(crate) struct ComponentRegistry {
    manager: i32,
    slots: BTreeMap<i32, ComponentSlot>,
    bindings: BTreeMap<Address, ChannelBinding>,
    next_component: Option<i32>,
}

impl ComponentRegistry {
    pub fn new(manager: i32) -> Self {
        Self {
            manager,
            slots: BTreeMap::new(),
            bindings: BTreeMap::new(),
            next_component: Some(1),
        }
    }

    /// Reserve the next component number; numbers are never handed out twice
    pub fn allocate_number(&mut self) -> Result<i32> {
        let number = self
            .next_component
            .ok_or_else(|| SwitchyardError::out_of_memory("component numbers exhausted"))?;
        self.next_component = number.checked_add(1);
        Ok(number)
    }

    pub fn insert(
        &mut self,
        number: i32,
        component_type: ComponentType,
        instance: Box<dyn Component>,
    ) {
        self.slots.insert(
            number,
            ComponentSlot {
                component_type,
                instance: Some(instance),
                doomed: false,
                pending_disconnects: Vec::new(),
                next_channel: Some(1),
            },
        );
    }

    pub fn remove(&mut self, number: i32) -> Option<ComponentSlot> {
        self.slots.remove(&number)
    }

    pub fn contains(&self, number: i32) -> bool {
        self.slots.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn numbers(&self) -> Vec<i32> {
        self.slots.keys().copied().collect()
    }

    pub fn component_type(&self, number: i32) -> Option<ComponentType> {
        self.slots.get(&number).map(|slot| slot.component_type)
    }

    pub fn instance(&self, number: i32) -> Option<&dyn Component> {
        self.slots
            .get(&number)
            .and_then(|slot| slot.instance.as_deref())
    }

    pub fn instance_mut(&mut self, number: i32) -> Option<&mut (dyn Component + 'static)> {
        self.slots
            .get_mut(&number)
            .and_then(|slot| slot.instance.as_deref_mut())
    }

    /// Check a component out for dispatch
    pub fn take_instance(&mut self, number: i32) -> Option<Box<dyn Component>> {
        self.slots
            .get_mut(&number)
            .and_then(|slot| slot.instance.take())
    }

    /// Return a component checked out with `take_instance`
    pub fn restore_instance(&mut self, number: i32, instance: Box<dyn Component>) {
        if let Some(slot) = self.slots.get_mut(&number) {
            slot.instance = Some(instance);
        }
    }

    pub fn mark_doomed(&mut self, number: i32) -> bool {
        match self.slots.get_mut(&number) {
            Some(slot) => {
                slot.doomed = true;
                true
            }
            None => false,
        }
    }

    pub fn is_doomed(&self, number: i32) -> bool {
        self.slots.get(&number).map_or(false, |slot| slot.doomed)
    }

    /// Remember a lost channel until the checked-out instance comes back
    pub fn defer_disconnect(&mut self, number: i32, channel: Address) -> bool {
        match self.slots.get_mut(&number) {
            Some(slot) => {
                slot.pending_disconnects.push(channel);
                true
            }
            None => false,
        }
    }

    pub fn take_pending_disconnects(&mut self, number: i32) -> Vec<Address> {
        self.slots
            .get_mut(&number)
            .map(|slot| std::mem::take(&mut slot.pending_disconnects))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------------

    /// Reserve the next channel address of a component
    pub fn allocate_channel(&mut self, number: i32) -> Result<Address> {
        let slot = self.slots.get_mut(&number).ok_or_else(|| {
            SwitchyardError::no_such_resource(format!("component {}.{}", self.manager, number))
        })?;
        let channel = slot.next_channel.ok_or_else(|| {
            SwitchyardError::out_of_memory(format!("channel numbers of component {}", number))
        })?;
        slot.next_channel = channel.checked_add(1);
        Ok(Address::channel(self.manager, number, channel))
    }

    pub fn bind(&mut self, channel: Address, binding: ChannelBinding) {
        self.bindings.insert(channel, binding);
    }

    pub fn unbind(&mut self, channel: &Address) -> Option<ChannelBinding> {
        self.bindings.remove(channel)
    }

    pub fn binding(&self, channel: &Address) -> Option<&ChannelBinding> {
        self.bindings.get(channel)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Remove and return every binding owned by a component
    pub fn unbind_component(&mut self, number: i32) -> Vec<(Address, ChannelBinding)> {
        self.unbind_where(|_, binding| binding.component == number)
    }

    /// Remove and return every binding whose remote endpoint matches
    pub fn unbind_remote<P>(&mut self, predicate: P) -> Vec<(Address, ChannelBinding)>
    where
        P: Fn(&Address) -> bool,
    {
        self.unbind_where(|_, binding| predicate(&binding.remote))
    }

    fn unbind_where<P>(&mut self, predicate: P) -> Vec<(Address, ChannelBinding)>
    where
        P: Fn(&Address, &ChannelBinding) -> bool,
    {
        let doomed: Vec<Address> = self
            .bindings
            .iter()
            .filter(|(channel, binding)| predicate(*channel, *binding))
            .map(|(channel, _)| *channel)
            .collect();

        doomed
            .into_iter()
            .filter_map(|channel| self.bindings.remove(&channel).map(|b| (channel, b)))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
