//! Core types shared by all providers

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the balancer distributes traffic across a farm.
///
/// The mode decides which executor strategy drives the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerMode {
    /// Clients are pinned to one server (session affinity)
    #[default]
    Sticky,
    /// Requests are spread across all servers in turn
    RoundRobin,
}

impl FromStr for LoadBalancerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "sticky" => Ok(Self::Sticky),
            "roundrobin" => Ok(Self::RoundRobin),
            _ => Err(Error::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for LoadBalancerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sticky => write!(f, "sticky"),
            Self::RoundRobin => write!(f, "round-robin"),
        }
    }
}

/// How a server is taken out of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendMethod {
    /// Stop new sessions, let existing ones finish
    Graceful,
    /// Cut the server out immediately
    Suspend,
}

impl fmt::Display for SuspendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graceful => write!(f, "graceful"),
            Self::Suspend => write!(f, "suspend"),
        }
    }
}

/// Acknowledgement returned by a successful suspend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// Server is out of rotation and ready for deployment
    Suspended,
    /// Server is out of rotation but must not be deployed to
    Held { reason: String },
}

impl SuspendOutcome {
    /// Whether the balancer asked to skip deployment on this server
    pub fn prevents_deployment(&self) -> bool {
        matches!(self, Self::Held { .. })
    }
}

/// `[load_balancer]` section of a deployment file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    /// Registered provider name (e.g. "command", "http")
    pub provider: String,

    /// Traffic distribution mode ("sticky" or "round-robin")
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Provider-specific settings
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_mode() -> String {
    LoadBalancerMode::default().to_string()
}

impl LoadBalancerConfig {
    /// Create a config for a provider with the default mode and no options
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            mode: default_mode(),
            options: BTreeMap::new(),
        }
    }

    /// Builder-style option setter
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Builder-style mode setter
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Parse the configured mode
    pub fn mode(&self) -> Result<LoadBalancerMode> {
        self.mode.parse()
    }

    /// Look up an optional provider setting
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Look up a provider setting that must be present and non-empty
    pub fn require_option(&self, key: &str) -> Result<&str> {
        match self.option(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(Error::InvalidConfig(format!(
                "provider '{}' requires option '{}'",
                self.provider, key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_loosely() {
        assert_eq!("sticky".parse::<LoadBalancerMode>().unwrap(), LoadBalancerMode::Sticky);
        assert_eq!(
            "RoundRobin".parse::<LoadBalancerMode>().unwrap(),
            LoadBalancerMode::RoundRobin
        );
        assert_eq!(
            "round-robin".parse::<LoadBalancerMode>().unwrap(),
            LoadBalancerMode::RoundRobin
        );
        assert_eq!(
            "round_robin".parse::<LoadBalancerMode>().unwrap(),
            LoadBalancerMode::RoundRobin
        );
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "least-connections".parse::<LoadBalancerMode>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode(ref m) if m == "least-connections"));
    }

    #[test]
    fn mode_display_parses_back() {
        for mode in [LoadBalancerMode::Sticky, LoadBalancerMode::RoundRobin] {
            assert_eq!(mode.to_string().parse::<LoadBalancerMode>().unwrap(), mode);
        }
    }

    #[test]
    fn config_from_toml() {
        let config: LoadBalancerConfig = toml::from_str(
            r#"
            provider = "http"
            mode = "round-robin"

            [options]
            url = "http://lb.internal:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider, "http");
        assert_eq!(config.mode().unwrap(), LoadBalancerMode::RoundRobin);
        assert_eq!(config.option("url"), Some("http://lb.internal:8080"));
        assert_eq!(config.option("token"), None);
    }

    #[test]
    fn config_defaults_to_sticky() {
        let config: LoadBalancerConfig = toml::from_str(r#"provider = "noop""#).unwrap();
        assert_eq!(config.mode().unwrap(), LoadBalancerMode::Sticky);
        assert!(config.options.is_empty());
    }

    #[test]
    fn require_option_rejects_blank_values() {
        let config = LoadBalancerConfig::new("command").with_option("suspend", "  ");
        let err = config.require_option("suspend").unwrap_err();
        assert!(err.to_string().contains("requires option 'suspend'"));
    }

    #[test]
    fn held_outcome_prevents_deployment() {
        assert!(!SuspendOutcome::Suspended.prevents_deployment());
        assert!(
            SuspendOutcome::Held {
                reason: "draining".into()
            }
            .prevents_deployment()
        );
    }
}
