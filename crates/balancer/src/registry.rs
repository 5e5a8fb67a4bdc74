//! Provider registry
//!
//! Maps a provider name from configuration to a factory function. Resolution
//! happens once at startup.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::provider::{CommandLoadBalancer, DefaultLoadBalancer, HttpLoadBalancer, LoadBalancer};
use crate::types::LoadBalancerConfig;

/// Factory building a provider from its configuration
pub type ProviderFactory = fn(&LoadBalancerConfig) -> Result<Box<dyn LoadBalancer>>;

/// Registry of known load balancer providers
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in providers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("noop", noop_factory);
        registry.register("default", noop_factory);
        registry.register("command", command_factory);
        registry.register("http", http_factory);
        registry
    }

    /// Register (or replace) a provider under `name`
    pub fn register(&mut self, name: &str, factory: ProviderFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Check whether a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Build the balancer for a configuration.
    ///
    /// No configuration resolves to the no-op [`DefaultLoadBalancer`].
    pub fn resolve(&self, config: Option<&LoadBalancerConfig>) -> Result<Box<dyn LoadBalancer>> {
        let Some(config) = config else {
            return Ok(Box::new(DefaultLoadBalancer::default()));
        };

        // Mode is checked before the provider lookup.
        config.mode()?;

        let factory = self
            .factories
            .get(&config.provider.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownProvider {
                name: config.provider.clone(),
                available: self.providers().join(", "),
            })?;

        log::debug!(
            "resolved load balancer provider '{}' ({})",
            config.provider,
            config.mode
        );
        factory(config)
    }
}

fn noop_factory(config: &LoadBalancerConfig) -> Result<Box<dyn LoadBalancer>> {
    Ok(Box::new(DefaultLoadBalancer::new(config.mode()?)))
}

fn command_factory(config: &LoadBalancerConfig) -> Result<Box<dyn LoadBalancer>> {
    Ok(Box::new(CommandLoadBalancer::from_config(config)?))
}

fn http_factory(config: &LoadBalancerConfig) -> Result<Box<dyn LoadBalancer>> {
    Ok(Box::new(HttpLoadBalancer::from_config(config)?))
}
