//! Core types for rolling deployments

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use balancer::LoadBalancerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a server is in the balancer's rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerState {
    /// Receiving traffic
    #[default]
    Online,
    /// Taken out of rotation
    Offline,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Load balancer view of one server during a run.
///
/// Servers are assumed live before a run starts, except the marked server
/// when resuming a stopped rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadBalancerState {
    /// Current rotation state
    pub current_state: ServerState,
    /// The balancer asked not to deploy to this server
    pub prevent_deployment: bool,
}

/// One member of the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerTarget {
    /// Unique name within a run
    pub name: String,

    /// Network address (defaults to `name`)
    #[serde(default)]
    pub host: Option<String>,

    /// Login user override
    #[serde(default)]
    pub user: Option<String>,

    /// Port override
    #[serde(default)]
    pub port: Option<u16>,

    /// Farm identifier passed to the balancer
    #[serde(default, rename = "farm")]
    pub load_balancer_farm: String,

    /// Marks the canary/boundary server for partial rollouts
    #[serde(default)]
    pub stop_server: bool,

    /// Free-form metadata used by conditions and templates
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Written only by load balancer executors
    #[serde(skip)]
    load_balancer_state: Cell<LoadBalancerState>,
}

impl ServerTarget {
    /// Create a server with no farm, no marker and no tags
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            user: None,
            port: None,
            load_balancer_farm: String::new(),
            stop_server: false,
            tags: BTreeMap::new(),
            load_balancer_state: Cell::new(LoadBalancerState::default()),
        }
    }

    /// Builder-style farm setter
    pub fn with_farm(mut self, farm: impl Into<String>) -> Self {
        self.load_balancer_farm = farm.into();
        self
    }

    /// Builder-style host setter
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Builder-style tag setter
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Mark this server as the stop server
    pub fn marked(mut self) -> Self {
        self.stop_server = true;
        self
    }

    /// Address to connect to
    pub fn address(&self) -> &str {
        self.host.as_deref().unwrap_or(&self.name)
    }

    /// Look up a tag value
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Snapshot of the load balancer state
    pub fn load_balancer_state(&self) -> LoadBalancerState {
        self.load_balancer_state.get()
    }

    /// Whether the server is currently in rotation
    pub fn is_online(&self) -> bool {
        self.load_balancer_state().current_state == ServerState::Online
    }

    pub(crate) fn set_load_balancer_state(&self, state: LoadBalancerState) {
        log::trace!(
            "server [{}] -> {} (prevent deployment: {})",
            self.name,
            state.current_state,
            state.prevent_deployment
        );
        self.load_balancer_state.set(state);
    }
}

/// Partial rollout switches, fixed for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Deploy only to the marked server and leave it offline
    pub stop_after_marked_server: bool,
    /// Restore the marked server and deploy to everything else
    pub continue_after_marked_server: bool,
}

impl RunOptions {
    /// Full rolling rollout
    pub fn full() -> Self {
        Self::default()
    }

    /// Canary run: marked server only
    pub fn stop_after_marked() -> Self {
        Self {
            stop_after_marked_server: true,
            continue_after_marked_server: false,
        }
    }

    /// Resume after a canary run
    pub fn continue_after_marked() -> Self {
        Self {
            stop_after_marked_server: false,
            continue_after_marked_server: true,
        }
    }

    /// Both switches set; `stop_after_marked_server` wins
    pub fn is_ambiguous(&self) -> bool {
        self.stop_after_marked_server && self.continue_after_marked_server
    }
}

/// Everything a run needs besides the sequences themselves
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    /// Fleet in configuration order
    pub servers: Vec<ServerTarget>,
    /// `None` means no balancer is consulted at all
    pub load_balancer: Option<LoadBalancerConfig>,
    /// Partial rollout switches
    pub options: RunOptions,
}

impl RunSettings {
    /// Settings for a fleet with no balancer and a full rollout
    pub fn new(servers: Vec<ServerTarget>) -> Self {
        Self {
            servers,
            load_balancer: None,
            options: RunOptions::default(),
        }
    }

    /// Builder-style balancer setter
    pub fn with_load_balancer(mut self, config: LoadBalancerConfig) -> Self {
        self.load_balancer = Some(config);
        self
    }

    /// Builder-style options setter
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether a balancer is configured
    pub fn has_load_balancer(&self) -> bool {
        self.load_balancer.is_some()
    }

    /// Start the marked server Offline when resuming a stopped rollout.
    ///
    /// Server state does not outlive a process. A run with
    /// `continue_after_marked_server` (and no stop) follows a stopped run that
    /// left the marked server suspended, so it must start Offline for the
    /// resume to reach the balancer. Without a balancer nothing changes. An
    /// ambiguous marker is left for the run to report.
    pub fn resuming_stopped_rollout(self) -> Self {
        let resuming = self.options.continue_after_marked_server
            && !self.options.stop_after_marked_server
            && self.has_load_balancer();
        if resuming && let Ok(Some(marked)) = self.marked_server() {
            log::debug!("server [{}] assumed offline from a stopped run", marked.name);
            marked.set_load_balancer_state(LoadBalancerState {
                current_state: ServerState::Offline,
                prevent_deployment: false,
            });
        }
        self
    }

    /// Find a server by name
    pub fn server(&self, name: &str) -> Option<&ServerTarget> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// The boundary server: the one marked `stop_server`, else the first.
    ///
    /// Returns `None` only for an empty fleet.
    pub fn marked_server(&self) -> Result<Option<&ServerTarget>> {
        let marked: Vec<&ServerTarget> = self.servers.iter().filter(|s| s.stop_server).collect();
        match marked.as_slice() {
            [] => Ok(self.servers.first()),
            [server] => Ok(Some(*server)),
            _ => Err(Error::AmbiguousMarkedServer(
                marked.iter().map(|s| s.name.clone()).collect(),
            )),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Local sequences executed
    pub local_sequences: usize,
    /// Servers that received the remote sequences
    pub deployed: Vec<String>,
    /// Servers the balancer kept out of the deployment
    pub held: Vec<String>,
    /// Servers deliberately left out of rotation
    pub left_offline: Vec<String>,
}

impl RunSummary {
    /// Total servers visited in the remote phase
    pub fn servers_visited(&self) -> usize {
        self.deployed.len() + self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servers_start_online() {
        let server = ServerTarget::new("web01");
        let state = server.load_balancer_state();
        assert_eq!(state.current_state, ServerState::Online);
        assert!(!state.prevent_deployment);
        assert!(server.is_online());
    }

    #[test]
    fn address_falls_back_to_name() {
        assert_eq!(ServerTarget::new("web01").address(), "web01");
        assert_eq!(
            ServerTarget::new("web01").with_host("10.0.0.5").address(),
            "10.0.0.5"
        );
    }

    #[test]
    fn server_deserializes_with_default_state() {
        let server: ServerTarget = serde_json::from_str(
            r#"{"name": "web01", "farm": "web", "stop_server": true, "tags": {"role": "api"}}"#,
        )
        .unwrap();
        assert_eq!(server.load_balancer_farm, "web");
        assert!(server.stop_server);
        assert_eq!(server.tag("role"), Some("api"));
        assert!(server.is_online());
    }

    #[test]
    fn marked_server_prefers_marker() {
        let settings = RunSettings::new(vec![
            ServerTarget::new("a"),
            ServerTarget::new("b").marked(),
            ServerTarget::new("c"),
        ]);
        assert_eq!(settings.marked_server().unwrap().unwrap().name, "b");
    }

    #[test]
    fn marked_server_defaults_to_first() {
        let settings = RunSettings::new(vec![ServerTarget::new("a"), ServerTarget::new("b")]);
        assert_eq!(settings.marked_server().unwrap().unwrap().name, "a");
    }

    #[test]
    fn marked_server_of_empty_fleet() {
        assert!(RunSettings::default().marked_server().unwrap().is_none());
    }

    #[test]
    fn two_markers_are_rejected() {
        let settings = RunSettings::new(vec![
            ServerTarget::new("a").marked(),
            ServerTarget::new("b").marked(),
        ]);
        assert!(matches!(
            settings.marked_server(),
            Err(Error::AmbiguousMarkedServer(names)) if names == ["a", "b"]
        ));
    }

    fn canary_fleet() -> Vec<ServerTarget> {
        vec![ServerTarget::new("a"), ServerTarget::new("b").marked()]
    }

    #[test]
    fn resuming_starts_marked_server_offline() {
        let settings = RunSettings::new(canary_fleet())
            .with_load_balancer(LoadBalancerConfig::new("noop"))
            .with_options(RunOptions::continue_after_marked())
            .resuming_stopped_rollout();

        assert!(settings.servers[0].is_online());
        assert_eq!(
            settings.servers[1].load_balancer_state().current_state,
            ServerState::Offline
        );
    }

    #[test]
    fn resuming_leaves_state_alone_otherwise() {
        let cases = [
            (RunOptions::full(), true),
            (RunOptions::stop_after_marked(), true),
            (
                RunOptions {
                    stop_after_marked_server: true,
                    continue_after_marked_server: true,
                },
                true,
            ),
            (RunOptions::continue_after_marked(), false),
        ];
        for (options, balanced) in cases {
            let settings = RunSettings::new(canary_fleet()).with_options(options);
            let settings = if balanced {
                settings.with_load_balancer(LoadBalancerConfig::new("noop"))
            } else {
                settings
            };
            let settings = settings.resuming_stopped_rollout();
            assert!(
                settings.servers.iter().all(ServerTarget::is_online),
                "{options:?} (balancer: {balanced})"
            );
        }
    }

    #[test]
    fn resuming_with_two_markers_defers_the_error() {
        let settings = RunSettings::new(vec![
            ServerTarget::new("a").marked(),
            ServerTarget::new("b").marked(),
        ])
        .with_load_balancer(LoadBalancerConfig::new("noop"))
        .with_options(RunOptions::continue_after_marked())
        .resuming_stopped_rollout();

        assert!(settings.servers.iter().all(ServerTarget::is_online));
        assert!(settings.marked_server().is_err());
    }

    #[test]
    fn ambiguous_options() {
        assert!(!RunOptions::full().is_ambiguous());
        let both = RunOptions {
            stop_after_marked_server: true,
            continue_after_marked_server: true,
        };
        assert!(both.is_ambiguous());
    }
}
