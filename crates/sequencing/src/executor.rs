//! Load balancer executor strategies
//!
//! An executor decides which servers a run deploys to, in what order, and
//! moves a single server between Online and Offline against the external
//! balancer. The transition logic is shared; variants only differ in how they
//! ask the balancer to let go of a server.

use std::collections::BTreeMap;
use std::sync::Arc;

use balancer::{LoadBalancer, LoadBalancerMode, SuspendMethod, SuspendOutcome};

use crate::context::{CancellationToken, StatusReporter, with_section};
use crate::error::{Error, Result};
use crate::types::{LoadBalancerState, RunSettings, ServerState, ServerTarget};

/// Strategy for server ordering and rotation state
pub trait LoadBalancerExecutor {
    /// Take a server out of rotation; no-op when it already is
    fn bring_offline(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Put a server back into rotation; no-op when it already is
    fn bring_online(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Servers to deploy to, in order.
    ///
    /// - stop after marked server: only the marked server (or the first one)
    /// - continue after marked server: bring the marked server online and
    ///   return everything else in configuration order
    /// - otherwise: the whole fleet in configuration order
    ///
    /// `stop_after_marked_server` is checked first, so it wins when both
    /// options are set.
    fn get_server_execution_order<'s>(
        &self,
        status: &mut dyn StatusReporter,
        settings: &'s RunSettings,
        token: &CancellationToken,
    ) -> Result<Vec<&'s ServerTarget>> {
        if settings.options.stop_after_marked_server {
            return Ok(settings.marked_server()?.into_iter().collect());
        }

        if settings.options.continue_after_marked_server {
            let Some(marked) = settings.marked_server()? else {
                return Ok(Vec::new());
            };
            self.bring_online(marked, status, settings, token)?;
            return Ok(settings
                .servers
                .iter()
                .filter(|server| server.name != marked.name)
                .collect());
        }

        Ok(settings.servers.iter().collect())
    }

    /// Render the offline transition without performing it
    fn dry_run_bring_offline(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
    ) {
        if settings.has_load_balancer() {
            status.info(&offline_message(server));
        }
    }

    /// Render the online transition without performing it
    fn dry_run_bring_online(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
    ) {
        if settings.has_load_balancer() {
            status.info(&online_message(server));
        }
    }
}

/// Build the executor for a balancer mode
pub fn executor_for(
    mode: LoadBalancerMode,
    balancer: Arc<dyn LoadBalancer>,
    servers: &[ServerTarget],
) -> Box<dyn LoadBalancerExecutor> {
    match mode {
        LoadBalancerMode::Sticky => Box::new(StickyLoadBalancerExecutor::new(balancer)),
        LoadBalancerMode::RoundRobin => {
            Box::new(RoundRobinLoadBalancerExecutor::new(servers, balancer))
        }
    }
}

fn offline_message(server: &ServerTarget) -> String {
    format!("Taking server [{}] offline in load balancer.", server.name)
}

fn online_message(server: &ServerTarget) -> String {
    format!("Taking server [{}] online in load balancer.", server.name)
}

/// Suspend `server` unless there is nothing to do.
///
/// State is written only after the balancer accepted the call.
fn take_offline(
    balancer: &dyn LoadBalancer,
    method: SuspendMethod,
    server: &ServerTarget,
    status: &mut dyn StatusReporter,
    settings: &RunSettings,
) -> Result<()> {
    if !settings.has_load_balancer() || server.load_balancer_state().current_state == ServerState::Offline {
        return Ok(());
    }

    with_section(status, &offline_message(server), |status| {
        let outcome = balancer
            .suspend(&server.name, &server.load_balancer_farm, method)
            .map_err(|source| Error::LoadBalancer {
                server: server.name.clone(),
                direction: "offline",
                source,
            })?;

        if let SuspendOutcome::Held { reason } = &outcome {
            status.warn(&format!(
                "Load balancer holds server [{}]: {reason}. Deployment will be skipped.",
                server.name
            ));
        }

        server.set_load_balancer_state(LoadBalancerState {
            current_state: ServerState::Offline,
            prevent_deployment: outcome.prevents_deployment(),
        });
        Ok(())
    })
}

fn bring_into_rotation(
    balancer: &dyn LoadBalancer,
    server: &ServerTarget,
    status: &mut dyn StatusReporter,
    settings: &RunSettings,
) -> Result<()> {
    if !settings.has_load_balancer() || server.is_online() {
        return Ok(());
    }

    with_section(status, &online_message(server), |_| {
        balancer
            .resume(&server.name, &server.load_balancer_farm)
            .map_err(|source| Error::LoadBalancer {
                server: server.name.clone(),
                direction: "online",
                source,
            })?;

        server.set_load_balancer_state(LoadBalancerState {
            current_state: ServerState::Online,
            prevent_deployment: false,
        });
        Ok(())
    })
}

/// Executor for farms with session affinity: sessions are drained first
pub struct StickyLoadBalancerExecutor {
    balancer: Arc<dyn LoadBalancer>,
}

impl StickyLoadBalancerExecutor {
    pub fn new(balancer: Arc<dyn LoadBalancer>) -> Self {
        Self { balancer }
    }
}

impl LoadBalancerExecutor for StickyLoadBalancerExecutor {
    fn bring_offline(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        take_offline(
            self.balancer.as_ref(),
            SuspendMethod::Graceful,
            server,
            status,
            settings,
        )
    }

    fn bring_online(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        bring_into_rotation(self.balancer.as_ref(), server, status, settings)
    }
}

/// Executor for round-robin farms.
///
/// Servers are suspended immediately. It knows the whole fleet so it can
/// report how much of a farm stays in rotation.
pub struct RoundRobinLoadBalancerExecutor {
    balancer: Arc<dyn LoadBalancer>,
    farms: BTreeMap<String, Vec<String>>,
}

impl RoundRobinLoadBalancerExecutor {
    pub fn new(servers: &[ServerTarget], balancer: Arc<dyn LoadBalancer>) -> Self {
        let mut farms: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for server in servers {
            farms
                .entry(server.load_balancer_farm.clone())
                .or_default()
                .push(server.name.clone());
        }
        Self { balancer, farms }
    }

    /// Other members of the server's farm that are still in rotation
    fn online_peers(&self, server: &ServerTarget, settings: &RunSettings) -> usize {
        self.farms
            .get(&server.load_balancer_farm)
            .map_or(0, |members| {
                members
                    .iter()
                    .filter(|name| **name != server.name)
                    .filter(|name| settings.server(name).is_none_or(ServerTarget::is_online))
                    .count()
            })
    }
}

impl LoadBalancerExecutor for RoundRobinLoadBalancerExecutor {
    fn bring_offline(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        let was_online = server.is_online();
        take_offline(
            self.balancer.as_ref(),
            SuspendMethod::Suspend,
            server,
            status,
            settings,
        )?;

        if was_online && !server.is_online() {
            let peers = self.online_peers(server, settings);
            if peers == 0 {
                status.warn(&format!(
                    "No other server in farm [{}] is in rotation.",
                    server.load_balancer_farm
                ));
            } else {
                log::debug!(
                    "{peers} server(s) in farm [{}] remain in rotation",
                    server.load_balancer_farm
                );
            }
        }
        Ok(())
    }

    fn bring_online(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        bring_into_rotation(self.balancer.as_ref(), server, status, settings)
    }
}

/// Executor that never talks to a balancer
///
/// Used when no balancer is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoadBalancerExecutor;

impl LoadBalancerExecutor for DefaultLoadBalancerExecutor {
    fn bring_offline(
        &self,
        _server: &ServerTarget,
        _status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    fn bring_online(
        &self,
        _server: &ServerTarget,
        _status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }
}
