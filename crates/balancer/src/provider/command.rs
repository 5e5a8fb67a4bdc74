//! Shell command provider.
//!
//! Drives any balancer that can be scripted: the suspend and resume commands
//! are configured as templates and run through `sh -c`.
//!
//! ```toml
//! [load_balancer]
//! provider = "command"
//! mode = "sticky"
//!
//! [load_balancer.options]
//! suspend = "haproxyctl disable server {farm}/{server}"
//! resume = "haproxyctl enable server {farm}/{server}"
//! hold_exit_code = "3"
//! ```

use std::process::Command;

use crate::error::{Error, Result};
use crate::types::{LoadBalancerConfig, LoadBalancerMode, SuspendMethod, SuspendOutcome};

use super::{LoadBalancer, expand_template};

/// Balancer driven by shell command templates.
///
/// ## Placeholders
///
/// - `{server}` - server name
/// - `{farm}` - load balancer farm
/// - `{method}` - `graceful` or `suspend` (suspend command only)
///
/// A suspend command exiting with `hold_exit_code` means the server was taken
/// out of rotation but must not be deployed to.
#[derive(Debug, Clone)]
pub struct CommandLoadBalancer {
    mode: LoadBalancerMode,
    suspend: String,
    resume: String,
    hold_exit_code: Option<i32>,
}

impl CommandLoadBalancer {
    /// Build from the `[load_balancer]` configuration
    pub fn from_config(config: &LoadBalancerConfig) -> Result<Self> {
        let hold_exit_code = match config.option("hold_exit_code") {
            Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| {
                Error::InvalidConfig(format!("hold_exit_code must be an integer, got '{}'", raw))
            })?),
            None => None,
        };

        Ok(Self {
            mode: config.mode()?,
            suspend: config.require_option("suspend")?.to_string(),
            resume: config.require_option("resume")?.to_string(),
            hold_exit_code,
        })
    }

    /// Run a shell command, returning its exit code.
    ///
    /// `accepted` is an extra non-zero exit code treated as success.
    fn run(command: &str, accepted: Option<i32>) -> Result<i32> {
        log::debug!("running balancer command: {command}");
        let output = Command::new("sh").arg("-c").arg(command).output()?;

        let code = output.status.code().unwrap_or(-1);
        if output.status.success() || Some(code) == accepted {
            return Ok(code);
        }

        Err(Error::CommandFailed {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl LoadBalancer for CommandLoadBalancer {
    fn mode(&self) -> LoadBalancerMode {
        self.mode
    }

    fn suspend(&self, server: &str, farm: &str, method: SuspendMethod) -> Result<SuspendOutcome> {
        let command = expand_template(&self.suspend, server, farm, Some(method));
        let code = Self::run(&command, self.hold_exit_code)?;

        if code != 0 && Some(code) == self.hold_exit_code {
            return Ok(SuspendOutcome::Held {
                reason: format!("suspend command exited with {}", code),
            });
        }
        Ok(SuspendOutcome::Suspended)
    }

    fn resume(&self, server: &str, farm: &str) -> Result<()> {
        let command = expand_template(&self.resume, server, farm, None);
        Self::run(&command, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(suspend: &str, resume: &str) -> LoadBalancerConfig {
        LoadBalancerConfig::new("command")
            .with_option("suspend", suspend)
            .with_option("resume", resume)
    }

    #[test]
    fn requires_both_commands() {
        let cfg = LoadBalancerConfig::new("command").with_option("suspend", "true");
        let err = CommandLoadBalancer::from_config(&cfg).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("'resume'"));
    }

    #[test]
    fn rejects_non_numeric_hold_code() {
        let cfg = config("true", "true").with_option("hold_exit_code", "draining");
        assert!(matches!(
            CommandLoadBalancer::from_config(&cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unsupported_mode() {
        let cfg = config("true", "true").with_mode("weighted");
        assert!(matches!(
            CommandLoadBalancer::from_config(&cfg),
            Err(Error::UnsupportedMode(_))
        ));
    }

    #[test]
    fn successful_commands() {
        let lb = CommandLoadBalancer::from_config(&config("true", "true")).unwrap();
        assert_eq!(
            lb.suspend("web01", "web", SuspendMethod::Graceful).unwrap(),
            SuspendOutcome::Suspended
        );
        lb.resume("web01", "web").unwrap();
    }

    #[test]
    fn failing_command_reports_stderr() {
        let lb =
            CommandLoadBalancer::from_config(&config("echo 'no such farm' >&2; exit 1", "true"))
                .unwrap();
        let err = lb
            .suspend("web01", "web", SuspendMethod::Suspend)
            .unwrap_err();
        match err {
            Error::CommandFailed { stderr, .. } => assert_eq!(stderr, "no such farm"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn hold_exit_code_maps_to_held() {
        let cfg = config("exit 3", "true").with_option("hold_exit_code", "3");
        let lb = CommandLoadBalancer::from_config(&cfg).unwrap();
        let outcome = lb.suspend("web01", "web", SuspendMethod::Graceful).unwrap();
        assert!(outcome.prevents_deployment());
    }

    #[test]
    fn placeholders_reach_the_shell() {
        let cfg = config(
            "test {server} = web01 && test {farm} = web",
            "test -z '{method}'",
        );
        let lb = CommandLoadBalancer::from_config(&cfg).unwrap();
        lb.suspend("web01", "web", SuspendMethod::Graceful).unwrap();
        lb.resume("web01", "web").unwrap();
    }
}
