use anyhow::{Context, Result};
use sequencing::{CancellationToken, Notification, Operation, RunSettings, ServerTarget, StatusReporter};
use std::path::PathBuf;
use std::sync::Arc;

use super::template::Template;
use crate::paths;
use crate::runner;
use crate::schema::SshConfig;

/// Copy a local file or directory to the target server
#[derive(Debug)]
pub struct Upload {
    name: String,
    from: PathBuf,
    to: Template,
    ssh: Arc<SshConfig>,
}

impl Upload {
    pub fn new(name: impl Into<String>, from: &str, to: impl Into<String>, ssh: Arc<SshConfig>) -> Self {
        Self {
            name: name.into(),
            from: paths::expand(from),
            to: Template::new(to),
            ssh,
        }
    }
}

impl Operation for Upload {
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
        let server = server.context("Upload needs a target server")?;
        let to = self.to.render(Some(server))?;
        let target = self.ssh.target(server);
        status.info(&format!(
            "{} -> {}:{to}",
            self.from.display(),
            target.destination()
        ));
        runner::scp(&target, &self.from, &to)
    }

    fn dry_run(&self) -> String {
        format!("Would upload {} to {}", self.from.display(), self.to.raw())
    }

    fn is_valid(&self, notification: &mut Notification) -> bool {
        let mut valid = true;
        if !self.from.exists() {
            notification.add_error(
                &self.name,
                format!("local path does not exist: {}", self.from.display()),
            );
            valid = false;
        }
        for problem in self.to.check(true) {
            notification.add_error(&self.name, problem.to_string());
            valid = false;
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("app.tar.gz");
        let op = Upload::new(
            "ship",
            &missing.to_string_lossy(),
            "/opt/app",
            Arc::new(SshConfig::default()),
        );

        let mut notification = Notification::new();
        assert!(!op.is_valid(&mut notification));
        assert!(notification.errors()[0].message.starts_with("local path does not exist"));
    }

    #[test]
    fn existing_source_with_bad_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("app");
        std::fs::write(&file, b"binary").unwrap();
        let op = Upload::new(
            "ship",
            &file.to_string_lossy(),
            "/opt/{app}/bin",
            Arc::new(SshConfig::default()),
        );

        let mut notification = Notification::new();
        assert!(!op.is_valid(&mut notification));
        assert_eq!(notification.errors().len(), 1);
        assert_eq!(notification.errors()[0].message, "unknown placeholder {app}");
    }

    #[test]
    fn valid_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let op = Upload::new(
            "ship",
            &dir.path().to_string_lossy(),
            "/srv/{server}",
            Arc::new(SshConfig::default()),
        );
        assert!(op.is_valid(&mut Notification::new()));
        assert!(op.dry_run().ends_with("to /srv/{server}"));
    }
}
