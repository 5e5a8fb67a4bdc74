//! Two-phase run driver
//!
//! Local sequences run once with no server and no balancer. Remote sequences
//! then run per server, in the order the executor computes, with each server
//! taken out of rotation around its deployment.

use std::sync::Arc;

use balancer::{DefaultLoadBalancer, LoadBalancer, LoadBalancerConfig, LoadBalancerMode, Registry};

use crate::context::{CancellationToken, Notification, StatusReporter, with_section};
use crate::error::Result;
use crate::executor::{DefaultLoadBalancerExecutor, LoadBalancerExecutor, executor_for};
use crate::sequence::CompositeSequence;
use crate::types::{RunSettings, RunSummary, ServerTarget};

/// A top-level remote sequence
#[derive(Debug)]
pub struct RemoteSequence {
    sequence: CompositeSequence,
    parallel: bool,
}

impl RemoteSequence {
    /// The sequence tree
    pub fn sequence(&self) -> &CompositeSequence {
        &self.sequence
    }

    /// Declared parallel; execution is still sequential
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

/// Owns the sequences of a run and drives them
pub struct ExecutionManager {
    mode: LoadBalancerMode,
    executor: Box<dyn LoadBalancerExecutor>,
    dry_run_executor: Box<dyn LoadBalancerExecutor>,
    local_sequences: Vec<CompositeSequence>,
    remote_sequences: Vec<RemoteSequence>,
}

impl ExecutionManager {
    /// Create a manager for `servers`.
    ///
    /// Without a balancer every rotation change is a no-op. The dry-run
    /// executor always wraps a no-op balancer.
    pub fn new(servers: &[ServerTarget], balancer: Option<Arc<dyn LoadBalancer>>) -> Self {
        let (mode, executor) = match balancer {
            Some(balancer) => {
                let mode = balancer.mode();
                (mode, executor_for(mode, balancer, servers))
            }
            None => (
                LoadBalancerMode::default(),
                Box::new(DefaultLoadBalancerExecutor) as Box<dyn LoadBalancerExecutor>,
            ),
        };
        let dry_run_executor = executor_for(mode, Arc::new(DefaultLoadBalancer::new(mode)), servers);

        Self {
            mode,
            executor,
            dry_run_executor,
            local_sequences: Vec::new(),
            remote_sequences: Vec::new(),
        }
    }

    /// Create a manager with the balancer resolved from configuration.
    ///
    /// An unsupported mode or unknown provider fails here, before anything
    /// runs.
    pub fn from_config(
        servers: &[ServerTarget],
        config: Option<&LoadBalancerConfig>,
        registry: &Registry,
    ) -> Result<Self> {
        let balancer = match config {
            Some(config) => Some(Arc::<dyn LoadBalancer>::from(registry.resolve(Some(config))?)),
            None => None,
        };
        Ok(Self::new(servers, balancer))
    }

    /// Mode the executor was selected for
    pub fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    /// Register a local sequence
    pub fn new_local_sequence(&mut self, name: impl Into<String>) -> &mut CompositeSequence {
        self.local_sequences.push(CompositeSequence::new(name));
        let index = self.local_sequences.len() - 1;
        &mut self.local_sequences[index]
    }

    /// Register a remote sequence.
    ///
    /// `parallel` is recorded but has no effect on execution.
    pub fn new_remote_sequence(
        &mut self,
        name: impl Into<String>,
        parallel: bool,
    ) -> &mut CompositeSequence {
        let sequence = CompositeSequence::new(name);
        if parallel {
            log::debug!(
                "remote sequence '{}' is marked parallel; it will run sequentially",
                sequence.name()
            );
        }
        self.remote_sequences.push(RemoteSequence { sequence, parallel });
        let index = self.remote_sequences.len() - 1;
        &mut self.remote_sequences[index].sequence
    }

    /// Registered local sequences
    pub fn local_sequences(&self) -> &[CompositeSequence] {
        &self.local_sequences
    }

    /// Registered remote sequences
    pub fn remote_sequences(&self) -> &[RemoteSequence] {
        &self.remote_sequences
    }

    /// Run the local phase, then the remote phase.
    ///
    /// The first failure aborts the run. The server being deployed to stays
    /// out of rotation and later servers are not touched.
    pub fn execute(
        &self,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        with_section(status, "Local Operations", |status| -> Result<()> {
            for sequence in &self.local_sequences {
                token.check()?;
                sequence.execute(None, status, settings, token)?;
                summary.local_sequences += 1;
            }
            Ok(())
        })?;

        with_section(status, "Remote Operations", |status| -> Result<()> {
            let servers = self.executor.get_server_execution_order(status, settings, token)?;
            for server in servers {
                with_section(status, &server.name, |status| {
                    self.deploy_to(server, status, settings, token, &mut summary)
                })?;
            }
            Ok(())
        })?;

        Ok(summary)
    }

    fn deploy_to(
        &self,
        server: &ServerTarget,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.executor.bring_offline(server, status, settings, token)?;

        if server.load_balancer_state().prevent_deployment {
            status.warn(&format!(
                "Deployment to server [{}] prevented by load balancer.",
                server.name
            ));
            summary.held.push(server.name.clone());
        } else {
            for remote in &self.remote_sequences {
                token.check()?;
                remote.sequence.execute(Some(server), status, settings, token)?;
            }
            summary.deployed.push(server.name.clone());
        }

        if settings.options.stop_after_marked_server {
            if !server.is_online() {
                status.info(&format!(
                    "Server [{}] is left offline in load balancer.",
                    server.name
                ));
                summary.left_offline.push(server.name.clone());
            }
            return Ok(());
        }

        self.executor.bring_online(server, status, settings, token)
    }

    /// Validate the local sequences, collecting every problem
    pub fn is_valid(&self, notification: &mut Notification) -> bool {
        self.local_sequences
            .iter()
            .fold(true, |valid, sequence| sequence.is_valid(notification) && valid)
    }

    /// Validate the remote sequences, collecting every problem
    pub fn remote_is_valid(&self, notification: &mut Notification) -> bool {
        self.remote_sequences
            .iter()
            .fold(true, |valid, remote| remote.sequence.is_valid(notification) && valid)
    }

    /// Render the run for every configured server without side effects
    pub fn dry_run(&self, settings: &RunSettings, status: &mut dyn StatusReporter) {
        status.section_start("Local Operations");
        for sequence in &self.local_sequences {
            status.section_start(sequence.name());
            sequence.dry_run(status);
            status.section_end(sequence.name(), true);
        }
        status.section_end("Local Operations", true);

        status.section_start("Remote Operations");
        for server in &settings.servers {
            status.section_start(&server.name);
            self.dry_run_executor.dry_run_bring_offline(server, status, settings);
            for remote in &self.remote_sequences {
                let sequence = &remote.sequence;
                status.section_start(sequence.name());
                sequence.dry_run(status);
                status.section_end(sequence.name(), true);
            }
            self.dry_run_executor.dry_run_bring_online(server, status, settings);
            status.section_end(&server.name, true);
        }
        status.section_end("Remote Operations", true);
    }
}
