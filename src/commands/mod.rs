// Deployment commands
pub mod deploy;
pub mod plan;
pub mod validate;

// Inspection commands
pub mod providers;
pub mod servers;

use anyhow::Result;
use balancer::Registry;
use sequencing::{
    CancellationToken, DefaultLoadBalancerExecutor, ExecutionManager, LoadBalancerExecutor,
    NoStatus, Notification, RunOptions, RunSettings,
};
use std::path::PathBuf;

use crate::Context;
use crate::paths;
use crate::schema::DeployConfig;
use crate::ui;

/// A loaded and schema-validated deployment file
pub struct Deployment {
    pub path: PathBuf,
    pub config: DeployConfig,
    pub registry: Registry,
}

impl Deployment {
    /// Load the deployment file selected by the global flags
    pub fn load(ctx: &Context) -> Result<Self> {
        let path = paths::config_file(ctx.config.as_deref());
        log::info!("Using deployment file {}", path.display());

        let config = DeployConfig::load(&path)?;
        let registry = Registry::with_builtin();
        config.validate(&registry)?;

        Ok(Self {
            path,
            config,
            registry,
        })
    }

    /// Assemble the execution manager
    pub fn manager(&self) -> Result<ExecutionManager> {
        crate::steps::build_manager(&self.config, &self.registry)
    }

    /// Run settings for this deployment; the fleet moves into them
    pub fn into_settings(self, options: RunOptions) -> RunSettings {
        let settings = RunSettings::new(self.config.servers).with_options(options);
        let settings = match self.config.load_balancer {
            Some(lb) => settings.with_load_balancer(lb),
            None => settings,
        };
        settings.resuming_stopped_rollout()
    }
}

/// Warn when both rollout switches are given
pub fn warn_if_ambiguous(options: RunOptions) {
    if options.is_ambiguous() {
        ui::warn(
            "Both --stop-after-marked-server and --continue-after-marked-server given; \
             --stop-after-marked-server takes precedence.",
        );
    }
}

/// Validate every local and remote step
pub fn check_operations(manager: &ExecutionManager) -> Notification {
    let mut notification = Notification::new();
    let local = manager.is_valid(&mut notification);
    let remote = manager.remote_is_valid(&mut notification);
    log::debug!("step validation: local {local}, remote {remote}");
    notification
}

/// Print validation problems
pub fn print_problems(notification: &Notification) {
    for problem in notification.errors() {
        ui::error(&problem.to_string());
    }
}

/// Names of the servers a run would visit, without touching any balancer
pub fn server_order(settings: &RunSettings) -> Result<Vec<String>> {
    let order = DefaultLoadBalancerExecutor.get_server_execution_order(
        &mut NoStatus,
        settings,
        &CancellationToken::new(),
    )?;
    Ok(order.into_iter().map(|s| s.name.clone()).collect())
}
