//! Components and the factories that build them

use std::collections::BTreeMap;

use switchyard_core::{Address, ComponentType, Message, Result, SwitchyardError};

use crate::context::Context;

// ----------------------------------------------------------------------------
// Component Trait
// ----------------------------------------------------------------------------

/// An addressable unit of work hosted by one manager
pub trait Component {
    /// Handle a message addressed to this component or one of its channels
    ///
    /// `ctx` is the only way back into the manager while dispatching.
    fn dispatch(&mut self, message: Message, ctx: &mut Context<'_>) -> Result<()>;

    /// Whether this component answers for a channel address the manager
    /// has no binding for
    fn address_exists(&self, _address: Address) -> bool {
        false
    }

    /// A channel owned by this component lost its remote endpoint
    fn disconnect_messenger(&mut self, _channel: Address) -> Result<()> {
        Ok(())
    }

    /// Called once, right before the component is dropped
    fn on_destroy(&mut self, _address: Address) {}
}

// ----------------------------------------------------------------------------
// Factories
// ----------------------------------------------------------------------------

/// Builds components on behalf of a manager
pub trait ComponentFactory {
    fn create(
        &mut self,
        component_type: ComponentType,
        address: Address,
    ) -> Result<Box<dyn Component>>;
}

impl<F> ComponentFactory for F
where
    F: FnMut(ComponentType, Address) -> Result<Box<dyn Component>>,
{
    fn create(
        &mut self,
        component_type: ComponentType,
        address: Address,
    ) -> Result<Box<dyn Component>> {
        self(component_type, address)
    }
}

type Constructor = Box<dyn FnMut(Address) -> Result<Box<dyn Component>>>;

/// Factory dispatching on component type
#[derive(Default)]
pub struct FactoryRegistry {
    constructors: BTreeMap<ComponentType, Constructor>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for a component type
    pub fn register<F>(&mut self, component_type: ComponentType, constructor: F) -> &mut Self
    where
        F: FnMut(Address) -> Result<Box<dyn Component>> + 'static,
    {
        self.constructors
            .insert(component_type, Box::new(constructor));
        self
    }

    /// Builder-style `register`
    pub fn with<F>(mut self, component_type: ComponentType, constructor: F) -> Self
    where
        F: FnMut(Address) -> Result<Box<dyn Component>> + 'static,
    {
        self.register(component_type, constructor);
        self
    }

    pub fn supports(&self, component_type: ComponentType) -> bool {
        self.constructors.contains_key(&component_type)
    }

    pub fn types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.constructors.keys().copied()
    }
}

impl ComponentFactory for FactoryRegistry {
    fn create(
        &mut self,
        component_type: ComponentType,
        address: Address,
    ) -> Result<Box<dyn Component>> {
        let constructor = self.constructors.get_mut(&component_type).ok_or_else(|| {
            SwitchyardError::no_such_resource(format!("factory for {} components", component_type))
        })?;
        constructor(address)
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
