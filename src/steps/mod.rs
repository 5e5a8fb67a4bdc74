//! Concrete deployment steps and their assembly into sequences

pub mod command;
pub mod template;
pub mod upload;

use anyhow::Result;
use balancer::Registry;
use sequencing::{CompositeSequence, ConditionEvaluator, ExecutionManager};
use std::sync::Arc;

use crate::conditions::{SshConditionEvaluator, command_condition, tag_condition};
use crate::schema::{DeployConfig, Phase, SshConfig, StepAction, StepConfig};
use command::{LocalCommand, RemoteCommand};
use upload::Upload;

struct Builder {
    phase: Phase,
    ssh: Arc<SshConfig>,
    evaluator: Arc<dyn ConditionEvaluator>,
}

/// Build the execution manager for a validated deployment file
pub fn build_manager(config: &DeployConfig, registry: &Registry) -> Result<ExecutionManager> {
    let mut manager =
        ExecutionManager::from_config(&config.servers, config.load_balancer.as_ref(), registry)?;

    let ssh = Arc::new(config.ssh.clone());
    let evaluator: Arc<dyn ConditionEvaluator> = Arc::new(SshConditionEvaluator::new(ssh.clone()));

    let local = Builder {
        phase: Phase::Local,
        ssh: ssh.clone(),
        evaluator: evaluator.clone(),
    };
    for sequence in &config.local {
        local.add_steps(manager.new_local_sequence(&sequence.name), &sequence.steps)?;
    }

    let remote = Builder {
        phase: Phase::Remote,
        ssh,
        evaluator,
    };
    for sequence in &config.remote {
        remote.add_steps(
            manager.new_remote_sequence(&sequence.name, sequence.parallel),
            &sequence.steps,
        )?;
    }

    Ok(manager)
}

impl Builder {
    fn add_steps(&self, parent: &mut CompositeSequence, steps: &[StepConfig]) -> Result<()> {
        for step in steps {
            let target = if let Some(when) = &step.when {
                parent.new_conditional_composite_sequence(tag_condition(when))
            } else if let Some(expression) = &step.when_command {
                parent.new_conditional_composite_sequence(command_condition(
                    expression,
                    self.evaluator.clone(),
                ))
            } else {
                &mut *parent
            };

            let name = step.display_name();
            match step.action()? {
                StepAction::Run(command) => match self.phase {
                    Phase::Local => {
                        target.add(Box::new(LocalCommand::new(name, command)));
                    }
                    Phase::Remote => {
                        target.add(Box::new(RemoteCommand::new(name, command, self.ssh.clone())));
                    }
                },
                StepAction::Upload(upload) => {
                    target.add(Box::new(Upload::new(
                        name,
                        &upload.from,
                        upload.to.as_str(),
                        self.ssh.clone(),
                    )));
                }
                StepAction::Group(nested) => {
                    self.add_steps(target.new_composite_sequence(name), nested)?;
                }
            }
        }
        Ok(())
    }
}
