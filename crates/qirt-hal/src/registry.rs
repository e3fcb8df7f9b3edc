//! Driver registry for managing available drivers.
//!
//! The [`DriverRegistry`] provides a central point for discovering and
//! creating driver instances by name.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::driver::{Driver, DriverConfig, DriverFactory};
use crate::error::{HalError, HalResult};

/// Factory function type for registered drivers.
type Factory = Box<dyn Fn(DriverConfig) -> HalResult<Box<dyn Driver>> + Send + Sync>;

/// Central registry for execution drivers.
pub struct DriverRegistry {
    /// Driver factories keyed by name.
    factories: FxHashMap<String, Factory>,
}

impl DriverRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Register a driver type that can build itself from configuration.
    pub fn register<D>(&mut self, name: impl Into<String>)
    where
        D: DriverFactory + 'static,
    {
        let name = name.into();
        debug!("Registering driver: {}", name);
        self.factories.insert(
            name,
            Box::new(|config| {
                let driver = D::from_config(config)?;
                Ok(Box::new(driver))
            }),
        );
    }

    /// Register a driver factory with a custom constructor.
    pub fn register_factory(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(DriverConfig) -> HalResult<Box<dyn Driver>> + Send + Sync + 'static,
    ) {
        let name = name.into();
        debug!("Registering driver factory: {}", name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Create a driver from configuration, looked up by `config.name`.
    pub fn create(&self, config: DriverConfig) -> HalResult<Box<dyn Driver>> {
        match self.factories.get(&config.name) {
            Some(factory) => factory(config),
            None => Err(HalError::DriverUnavailable(format!(
                "No driver registered with name '{}'",
                config.name
            ))),
        }
    }

    /// List all available driver names.
    pub fn available_drivers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a driver is available by name.
    pub fn has_driver(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
