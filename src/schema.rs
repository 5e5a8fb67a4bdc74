use anyhow::{Context, Result};
use balancer::{LoadBalancerConfig, Registry};
use sequencing::ServerTarget;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::runner::SshTarget;

// ============================================================================
// Deployment File Schema
// ============================================================================

/// A deployment file (`stagehand.toml`)
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Default SSH connection settings
    #[serde(default)]
    pub ssh: SshConfig,

    /// External load balancer; absent means none is consulted
    #[serde(default)]
    pub load_balancer: Option<LoadBalancerConfig>,

    /// Fleet, in deployment order
    #[serde(default)]
    pub servers: Vec<ServerTarget>,

    /// Sequences run once on this machine before any server is touched
    #[serde(default)]
    pub local: Vec<SequenceConfig>,

    /// Sequences run on every server
    #[serde(default)]
    pub remote: Vec<SequenceConfig>,
}

impl DeployConfig {
    /// Load a deployment file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read deployment file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid deployment file: {}", path.display()))
    }

    /// Parse a deployment file from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format")
    }

    /// Validate the configuration
    pub fn validate(&self, registry: &Registry) -> Result<()> {
        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                anyhow::bail!("Server name cannot be empty");
            }
            if !names.insert(server.name.as_str()) {
                anyhow::bail!("Duplicate server: {}", server.name);
            }
        }

        let marked: Vec<&str> = self
            .servers
            .iter()
            .filter(|s| s.stop_server)
            .map(|s| s.name.as_str())
            .collect();
        if marked.len() > 1 {
            anyhow::bail!("Only one server can be marked stop_server, found: {}", marked.join(", "));
        }

        if let Some(lb) = &self.load_balancer {
            registry
                .resolve(Some(lb))
                .with_context(|| format!("Invalid load balancer '{}'", lb.provider))?;
        }

        for sequence in &self.local {
            sequence
                .validate(Phase::Local)
                .with_context(|| format!("Invalid local sequence '{}'", sequence.name))?;
        }

        for sequence in &self.remote {
            sequence
                .validate(Phase::Remote)
                .with_context(|| format!("Invalid remote sequence '{}'", sequence.name))?;
        }

        Ok(())
    }
}

/// Where a sequence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Local,
    Remote,
}

// ============================================================================
// SSH
// ============================================================================

/// `[ssh]` defaults, overridable per server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Private key; `~` and env vars are expanded
    #[serde(default)]
    pub identity_file: Option<String>,

    /// Extra `-o` options
    #[serde(default)]
    pub options: Vec<String>,
}

impl SshConfig {
    /// Connection parameters for a server
    pub fn target(&self, server: &ServerTarget) -> SshTarget {
        SshTarget {
            host: server.address().to_string(),
            user: server.user.clone().or_else(|| self.user.clone()),
            port: server.port.or(self.port),
            identity_file: self
                .identity_file
                .as_deref()
                .map(|path| crate::paths::expand(path).display().to_string()),
            options: self.options.clone(),
        }
    }
}

// ============================================================================
// Sequences and Steps
// ============================================================================

/// A named top-level sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceConfig {
    pub name: String,

    /// Accepted for remote sequences; execution is sequential either way
    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl SequenceConfig {
    pub fn validate(&self, phase: Phase) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Sequence name cannot be empty");
        }
        if self.parallel && phase == Phase::Local {
            anyhow::bail!("Local sequences cannot be parallel");
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate(phase)
                .with_context(|| format!("Invalid step #{} ({})", index + 1, step.display_name()))?;
        }
        Ok(())
    }
}

/// One step: exactly one of `run`, `upload` or `steps`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Display name; derived from the action when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command
    #[serde(default)]
    pub run: Option<String>,

    /// File or directory copy to the server
    #[serde(default)]
    pub upload: Option<UploadConfig>,

    /// Nested group
    #[serde(default)]
    pub steps: Option<Vec<StepConfig>>,

    /// Tag predicate gating the step
    #[serde(default)]
    pub when: Option<WhenConfig>,

    /// Command run on the server gating the step (exit 0 = run)
    #[serde(default)]
    pub when_command: Option<String>,
}

/// What a step does
#[derive(Debug, Clone, Copy)]
pub enum StepAction<'a> {
    Run(&'a str),
    Upload(&'a UploadConfig),
    Group(&'a [StepConfig]),
}

impl StepConfig {
    /// The single action of this step
    pub fn action(&self) -> Result<StepAction<'_>> {
        match (&self.run, &self.upload, &self.steps) {
            (Some(run), None, None) => Ok(StepAction::Run(run)),
            (None, Some(upload), None) => Ok(StepAction::Upload(upload)),
            (None, None, Some(steps)) => Ok(StepAction::Group(steps)),
            (None, None, None) => anyhow::bail!("Step needs one of `run`, `upload` or `steps`"),
            _ => anyhow::bail!("Step can only have one of `run`, `upload` or `steps`"),
        }
    }

    /// Name used in reports
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.action() {
            Ok(StepAction::Run(command)) => command.to_string(),
            Ok(StepAction::Upload(upload)) => format!("upload {} -> {}", upload.from, upload.to),
            Ok(StepAction::Group(_)) => "steps".to_string(),
            Err(_) => "step".to_string(),
        }
    }

    pub fn validate(&self, phase: Phase) -> Result<()> {
        let action = self.action()?;

        if self.when.is_some() && self.when_command.is_some() {
            anyhow::bail!("Step can only have one of `when` or `when_command`");
        }
        if phase == Phase::Local && (self.when.is_some() || self.when_command.is_some()) {
            anyhow::bail!("Local steps cannot be conditional");
        }
        if let Some(when) = &self.when {
            when.validate()?;
        }
        if let Some(command) = &self.when_command
            && command.trim().is_empty()
        {
            anyhow::bail!("`when_command` cannot be empty");
        }

        match action {
            StepAction::Run(command) => {
                if command.trim().is_empty() {
                    anyhow::bail!("Command cannot be empty");
                }
            }
            StepAction::Upload(upload) => {
                if phase == Phase::Local {
                    anyhow::bail!("Uploads are only possible in remote sequences");
                }
                upload.validate()?;
            }
            StepAction::Group(steps) => {
                for (index, step) in steps.iter().enumerate() {
                    step.validate(phase).with_context(|| {
                        format!("Invalid step #{} ({})", index + 1, step.display_name())
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// `upload = { from = "...", to = "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Local path; `~` and env vars are expanded
    pub from: String,
    /// Remote path; accepts placeholders
    pub to: String,
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            anyhow::bail!("Upload 'from' path cannot be empty");
        }
        if self.to.trim().is_empty() {
            anyhow::bail!("Upload 'to' path cannot be empty");
        }
        Ok(())
    }
}

/// `when = { tag = "role", equals = "db" }` or `when = { tag = "cron", exists = true }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenConfig {
    pub tag: String,

    #[serde(default)]
    pub equals: Option<String>,

    #[serde(default)]
    pub exists: Option<bool>,
}

impl WhenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            anyhow::bail!("`when.tag` cannot be empty");
        }
        match (&self.equals, self.exists) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => anyhow::bail!("`when` needs exactly one of `equals` or `exists`"),
        }
    }

    /// Whether a server passes this predicate
    pub fn matches(&self, server: &ServerTarget) -> bool {
        let value = server.tag(&self.tag);
        match (&self.equals, self.exists) {
            (Some(expected), _) => value == Some(expected.as_str()),
            (None, Some(exists)) => value.is_some() == exists,
            (None, None) => false,
        }
    }

    /// Human-readable form
    pub fn describe(&self) -> String {
        match (&self.equals, self.exists) {
            (Some(expected), _) => format!("tag {} = {expected}", self.tag),
            (None, Some(true)) => format!("tag {} exists", self.tag),
            (None, _) => format!("tag {} is absent", self.tag),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[ssh]
user = "deploy"
port = 2222
options = ["StrictHostKeyChecking=accept-new"]

[load_balancer]
provider = "command"
mode = "round-robin"

[load_balancer.options]
suspend = "lbctl disable {farm} {server}"
resume = "lbctl enable {farm} {server}"

[[servers]]
name = "web01"
host = "10.0.0.11"
farm = "web"
stop_server = true
tags = { role = "web" }

[[servers]]
name = "web02"
farm = "web"
user = "root"

[[local]]
name = "Build"
steps = [{ run = "cargo build --release" }]

[[remote]]
name = "Deploy"

[[remote.steps]]
upload = { from = "target/release/app", to = "/opt/app/bin/app" }

[[remote.steps]]
name = "Restart"
run = "systemctl restart app"
when = { tag = "role", equals = "web" }
"#;

    fn parse(content: &str) -> DeployConfig {
        DeployConfig::parse(content).unwrap()
    }

    #[test]
    fn test_parse_example() {
        let config = parse(EXAMPLE);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].load_balancer_farm, "web");
        assert!(config.servers[0].stop_server);
        assert_eq!(config.servers[0].tag("role"), Some("web"));
        assert_eq!(config.local[0].steps[0].display_name(), "cargo build --release");
        assert_eq!(config.remote[0].steps.len(), 2);
        assert_eq!(config.load_balancer.as_ref().unwrap().provider, "command");
        config.validate(&Registry::with_builtin()).unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stagehand.toml");
        std::fs::write(&path, EXAMPLE).unwrap();

        let config = DeployConfig::load(&path).unwrap();
        assert_eq!(config.remote[0].name, "Deploy");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = DeployConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read deployment file"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(DeployConfig::parse("[[servers]]\nname = \"a\"\nfram = \"web\"\n").is_err());
    }

    #[test]
    fn test_empty_config_is_valid() {
        DeployConfig::default().validate(&Registry::with_builtin()).unwrap();
    }

    #[test]
    fn test_duplicate_servers() {
        let config = parse("[[servers]]\nname = \"a\"\n[[servers]]\nname = \"a\"\n");
        let err = config.validate(&Registry::with_builtin()).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate server: a");
    }

    #[test]
    fn test_two_stop_servers() {
        let config = parse(
            "[[servers]]\nname = \"a\"\nstop_server = true\n[[servers]]\nname = \"b\"\nstop_server = true\n",
        );
        let err = config.validate(&Registry::with_builtin()).unwrap_err();
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_unsupported_mode() {
        let config = parse("[load_balancer]\nprovider = \"noop\"\nmode = \"weighted\"\n");
        let err = config.validate(&Registry::with_builtin()).unwrap_err();
        assert_eq!(format!("{err:#}"), "Invalid load balancer 'noop': Load Balancer mode [weighted] not supported.");
    }

    #[test]
    fn test_unknown_provider() {
        let config = parse("[load_balancer]\nprovider = \"f5\"\n");
        assert!(config.validate(&Registry::with_builtin()).is_err());
    }

    #[test]
    fn test_step_needs_exactly_one_action() {
        let empty = StepConfig::default();
        assert!(empty.validate(Phase::Remote).is_err());

        let both = StepConfig {
            run: Some("true".into()),
            steps: Some(Vec::new()),
            ..StepConfig::default()
        };
        assert!(both.validate(Phase::Remote).is_err());
    }

    #[test]
    fn test_nested_errors_carry_context() {
        let config = parse(
            r#"
[[remote]]
name = "Deploy"

[[remote.steps]]
name = "group"
steps = [{ run = "" }]
"#,
        );
        let err = config.validate(&Registry::with_builtin()).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "Invalid remote sequence 'Deploy': Invalid step #1 (group): Invalid step #1 (): Command cannot be empty"
        );
    }

    #[test]
    fn test_local_steps_cannot_be_conditional_or_upload() {
        let gated = StepConfig {
            run: Some("make".into()),
            when_command: Some("true".into()),
            ..StepConfig::default()
        };
        assert!(gated.validate(Phase::Local).is_err());
        assert!(gated.validate(Phase::Remote).is_ok());

        let upload = StepConfig {
            upload: Some(UploadConfig {
                from: "a".into(),
                to: "b".into(),
            }),
            ..StepConfig::default()
        };
        assert!(upload.validate(Phase::Local).is_err());
    }

    #[test]
    fn test_when_needs_one_test() {
        let when = WhenConfig {
            tag: "role".into(),
            equals: None,
            exists: None,
        };
        assert!(when.validate().is_err());
    }

    #[test]
    fn test_when_matches() {
        let server = ServerTarget::new("db01").with_tag("role", "db");
        let equals = WhenConfig {
            tag: "role".into(),
            equals: Some("db".into()),
            exists: None,
        };
        let absent = WhenConfig {
            tag: "cron".into(),
            equals: None,
            exists: Some(false),
        };
        assert!(equals.matches(&server));
        assert!(absent.matches(&server));
        assert_eq!(absent.describe(), "tag cron is absent");
        assert!(!equals.matches(&ServerTarget::new("web01")));
    }

    #[test]
    fn test_ssh_target_merges_defaults() {
        let config = parse(EXAMPLE);
        let web01 = config.ssh.target(&config.servers[0]);
        assert_eq!(web01.destination(), "deploy@10.0.0.11");
        assert_eq!(web01.port, Some(2222));

        let web02 = config.ssh.target(&config.servers[1]);
        assert_eq!(web02.destination(), "root@web02");
    }
}
