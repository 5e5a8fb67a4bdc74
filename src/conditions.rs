//! Condition gates for remote steps

use anyhow::Result;
use sequencing::{Condition, ConditionEvaluator, ServerTarget};
use std::sync::Arc;

use crate::runner;
use crate::schema::{SshConfig, WhenConfig};
use crate::steps::template::Template;

/// Evaluates an expression by running it on the server: exit 0 means true
#[derive(Debug)]
pub struct SshConditionEvaluator {
    ssh: Arc<SshConfig>,
}

impl SshConditionEvaluator {
    pub fn new(ssh: Arc<SshConfig>) -> Self {
        Self { ssh }
    }
}

impl ConditionEvaluator for SshConditionEvaluator {
    fn evaluate(&self, server: &ServerTarget, expression: &str) -> Result<bool> {
        let command = Template::new(expression).render(Some(server))?;
        let passed = runner::ssh_succeeds(&self.ssh.target(server), &command)?;
        log::debug!("condition `{command}` on [{}]: {passed}", server.name);
        Ok(passed)
    }
}

/// Gate built from a `when` table
pub fn tag_condition(when: &WhenConfig) -> Condition {
    let description = when.describe();
    let when = when.clone();
    Condition::predicate(description, move |server| when.matches(server))
}

/// Gate built from a `when_command`
pub fn command_condition(expression: &str, evaluator: Arc<dyn ConditionEvaluator>) -> Condition {
    Condition::expression(expression, evaluator)
}
