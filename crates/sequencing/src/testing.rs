//! Recording test doubles

use std::sync::{Arc, Mutex};

use balancer::{LoadBalancer, LoadBalancerConfig, LoadBalancerMode, SuspendMethod, SuspendOutcome};

use crate::context::{CancellationToken, Notification, StatusReporter};
use crate::operation::{BoxedOperation, Operation};
use crate::types::{RunSettings, ServerTarget};

/// Settings for `servers` with a balancer configured
pub fn balanced(servers: Vec<ServerTarget>) -> RunSettings {
    RunSettings::new(servers).with_load_balancer(LoadBalancerConfig::new("recording"))
}

fn target(server: Option<&ServerTarget>) -> &str {
    server.map_or("local", |s| s.name.as_str())
}

/// Shared, ordered log of what happened
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Operation that records `name@target` when executed
    pub fn op(&self, name: &str) -> BoxedOperation {
        Box::new(JournalOperation {
            name: name.to_string(),
            journal: self.clone(),
            cancel: None,
        })
    }

    /// Operation that records itself, then requests cancellation on `server`
    pub fn cancel_on(&self, name: &str, server: &str, token: CancellationToken) -> BoxedOperation {
        Box::new(JournalOperation {
            name: name.to_string(),
            journal: self.clone(),
            cancel: Some((server.to_string(), token)),
        })
    }

    /// Operation that records itself, then requests cancellation
    pub fn cancelling_op(&self, name: &str, token: CancellationToken) -> BoxedOperation {
        self.cancel_on(name, "local", token)
    }
}

#[derive(Debug)]
struct JournalOperation {
    name: String,
    journal: Journal,
    cancel: Option<(String, CancellationToken)>,
}

impl Operation for JournalOperation {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(
        &self,
        server: Option<&ServerTarget>,
        _status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        let target = target(server);
        self.journal.push(format!("{}@{target}", self.name));
        if let Some((on, token)) = &self.cancel {
            if on == target {
                token.cancel();
            }
        }
        Ok(())
    }

    fn dry_run(&self) -> String {
        format!("would run {}", self.name)
    }
}

/// Operation that fails, everywhere or on one server only
#[derive(Debug)]
pub struct Failing {
    name: String,
    only_on: Option<String>,
}

impl Failing {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            only_on: None,
        }
    }

    pub fn on_server(name: &str, server: &str) -> Self {
        Self {
            name: name.to_string(),
            only_on: Some(server.to_string()),
        }
    }
}

impl Operation for Failing {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(
        &self,
        server: Option<&ServerTarget>,
        _status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        match &self.only_on {
            Some(only) if only != target(server) => Ok(()),
            _ => anyhow::bail!("{} failed", self.name),
        }
    }

    fn dry_run(&self) -> String {
        format!("would fail {}", self.name)
    }
}

/// Operation with a fixed validation verdict
#[derive(Debug)]
pub struct Recorded {
    name: String,
    problem: Option<String>,
}

impl Recorded {
    pub fn invalid(name: &str, problem: &str) -> Self {
        Self {
            name: name.to_string(),
            problem: Some(problem.to_string()),
        }
    }
}

impl Operation for Recorded {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(
        &self,
        _server: Option<&ServerTarget>,
        _status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn dry_run(&self) -> String {
        self.name.clone()
    }

    fn is_valid(&self, notification: &mut Notification) -> bool {
        match &self.problem {
            Some(problem) => {
                notification.add_error(&self.name, problem);
                false
            }
            None => true,
        }
    }
}

/// Balancer that records every call in a [`Journal`]
#[derive(Debug)]
pub struct RecordingBalancer {
    mode: LoadBalancerMode,
    journal: Journal,
    fail_on: Option<String>,
    hold: Option<String>,
}

impl RecordingBalancer {
    pub fn new(mode: LoadBalancerMode) -> Self {
        Self {
            mode,
            journal: Journal::default(),
            fail_on: None,
            hold: None,
        }
    }

    /// Reject suspend calls for `server`
    pub fn fail_on(mut self, server: &str) -> Self {
        self.fail_on = Some(server.to_string());
        self
    }

    /// Answer suspend calls for `server` with [`SuspendOutcome::Held`]
    pub fn hold(mut self, server: &str) -> Self {
        self.hold = Some(server.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.entries()
    }

    /// Operation sharing this balancer's journal, to check interleaving
    pub fn journal_op(&self, name: &str) -> BoxedOperation {
        self.journal.op(name)
    }

    /// Like [`journal_op`](Self::journal_op), cancelling after running on `server`
    pub fn cancel_on_server(
        &self,
        name: &str,
        server: &str,
        token: CancellationToken,
    ) -> BoxedOperation {
        self.journal.cancel_on(name, server, token)
    }
}

impl LoadBalancer for RecordingBalancer {
    fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    fn suspend(
        &self,
        server: &str,
        farm: &str,
        method: SuspendMethod,
    ) -> balancer::Result<SuspendOutcome> {
        if self.fail_on.as_deref() == Some(server) {
            return Err(balancer::Error::CommandFailed {
                command: format!("suspend {server}"),
                stderr: "farm unreachable".into(),
            });
        }
        self.journal.push(format!("suspend {server} {farm} {method}"));
        if self.hold.as_deref() == Some(server) {
            return Ok(SuspendOutcome::Held {
                reason: "already draining".into(),
            });
        }
        Ok(SuspendOutcome::Suspended)
    }

    fn resume(&self, server: &str, farm: &str) -> balancer::Result<()> {
        self.journal.push(format!("resume {server} {farm}"));
        Ok(())
    }
}

/// Reporter that keeps every event as a line of text
#[derive(Debug, Default)]
pub struct RecordingStatus {
    pub lines: Vec<String>,
}

impl StatusReporter for RecordingStatus {
    fn section_start(&mut self, name: &str) {
        self.lines.push(format!("start {name}"));
    }

    fn section_end(&mut self, name: &str, success: bool) {
        let outcome = if success { "ok" } else { "failed" };
        self.lines.push(format!("end {name} ({outcome})"));
    }

    fn info(&mut self, message: &str) {
        self.lines.push(format!("info {message}"));
    }

    fn warn(&mut self, message: &str) {
        self.lines.push(format!("warn {message}"));
    }
}
