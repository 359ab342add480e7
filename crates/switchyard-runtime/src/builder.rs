//! Manager Builder API
//!
//! Provides a builder-style API for consumers (CLI/tests/embedders) to wire a
//! manager to its clock, platform, component factory and observer.

use tracing::info;

use switchyard_core::{
    Address, ManagerConfig, Message, MonotonicTimeSource, Result, SwitchyardError, TimeSource,
};

use crate::component::{ComponentFactory, FactoryRegistry};
use crate::diagnostics::{DispatchObserver, TracingObserver};
use crate::manager::{ComponentManager, ManagerHook};
use crate::platform::Platform;

// ----------------------------------------------------------------------------
// Manager Builder
// ----------------------------------------------------------------------------

/// Builder for a `ComponentManager`
pub struct ManagerBuilder {
    number: i32,
    config: ManagerConfig,
    time_source: Option<Box<dyn TimeSource>>,
    platform: Option<Box<dyn Platform>>,
    factory: Option<Box<dyn ComponentFactory>>,
    observer: Option<Box<dyn DispatchObserver>>,
    hook: Option<ManagerHook>,
}

impl ManagerBuilder {
    /// Create a new builder for manager `number`
    pub fn new(number: i32) -> Self {
        Self {
            number,
            config: ManagerConfig::default(),
            time_source: None,
            platform: None,
            factory: None,
            observer: None,
            hook: None,
        }
    }

    /// Set the manager configuration
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific clock (defaults to `MonotonicTimeSource`)
    pub fn with_time_source<T>(mut self, time_source: T) -> Self
    where
        T: TimeSource + 'static,
    {
        self.time_source = Some(Box::new(time_source));
        self
    }

    /// Attach the platform used for remote delivery and wake-ups
    pub fn with_platform<P>(mut self, platform: P) -> Self
    where
        P: Platform + 'static,
    {
        self.platform = Some(Box::new(platform));
        self
    }

    /// Set the component factory (defaults to an empty `FactoryRegistry`)
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: ComponentFactory + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Attach a dispatch observer
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: DispatchObserver + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Log every dispatch through `tracing`
    pub fn with_tracing(self) -> Self {
        self.with_observer(TracingObserver)
    }

    /// Receive manager-addressed messages the protocol itself ignores
    pub fn with_manager_hook<H>(mut self, hook: H) -> Self
    where
        H: FnMut(&Message) + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Validate the configuration and build the manager
    pub fn build(self) -> Result<ComponentManager> {
        if self.number < 0 {
            return Err(SwitchyardError::invalid_address(
                Address::manager(self.number),
                Address::ROOT,
            ));
        }
        self.config.validate()?;

        let time_source = self
            .time_source
            .unwrap_or_else(|| Box::new(MonotonicTimeSource::new()));
        let factory = self
            .factory
            .unwrap_or_else(|| Box::new(FactoryRegistry::new()));

        info!(
            manager = self.number,
            platform = self.platform.is_some(),
            "building component manager"
        );

        Ok(ComponentManager::from_parts(
            self.number,
            self.config,
            time_source,
            self.platform,
            factory,
            self.observer,
            self.hook,
        ))
    }
}
