use anyhow::{Context, Result};
use sequencing::{CancellationToken, Notification, Operation, RunSettings, ServerTarget, StatusReporter};
use std::sync::Arc;

use super::template::Template;
use crate::runner;
use crate::schema::SshConfig;

/// Shell command run once on this machine
#[derive(Debug)]
pub struct LocalCommand {
    name: String,
    command: Template,
}

impl LocalCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: Template::new(command),
        }
    }
}

impl Operation for LocalCommand {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(
        &self,
        server: Option<&ServerTarget>,
        status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        let command = self.command.render(server)?;
        status.info(&format!("$ {command}"));
        runner::shell(&command)
    }

    fn dry_run(&self) -> String {
        format!("Would run locally: {}", self.command.raw())
    }

    fn is_valid(&self, notification: &mut Notification) -> bool {
        let problems = self.command.check(false);
        for problem in &problems {
            notification.add_error(&self.name, problem.to_string());
        }
        problems.is_empty()
    }
}

/// Shell command run on the target server over SSH
#[derive(Debug)]
pub struct RemoteCommand {
    name: String,
    command: Template,
    ssh: Arc<SshConfig>,
}

impl RemoteCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>, ssh: Arc<SshConfig>) -> Self {
        Self {
            name: name.into(),
            command: Template::new(command),
            ssh,
        }
    }
}

impl Operation for RemoteCommand {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(
        &self,
        server: Option<&ServerTarget>,
        status: &mut dyn StatusReporter,
        _settings: &RunSettings,
        _token: &CancellationToken,
    ) -> Result<()> {
        let server = server.context("Remote command needs a target server")?;
        let command = self.command.render(Some(server))?;
        let target = self.ssh.target(server);
        status.info(&format!("{}$ {command}", target.destination()));
        runner::ssh(&target, &command)
    }

    fn dry_run(&self) -> String {
        format!("Would run on server: {}", self.command.raw())
    }

    fn is_valid(&self, notification: &mut Notification) -> bool {
        let problems = self.command.check(true);
        for problem in &problems {
            notification.add_error(&self.name, problem.to_string());
        }
        problems.is_empty()
    }
}
