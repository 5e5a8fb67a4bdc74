use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Connection parameters for one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
    pub options: Vec<String>,
}

impl SshTarget {
    /// `user@host`, or just `host`
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    fn common_args(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.port {
            args.push(port_flag.to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args
    }

    /// Arguments for `ssh` running `command` on this target
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_args("-p");
        args.push(self.destination());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    /// Arguments for `scp` copying `from` to `to` on this target
    pub fn scp_args(&self, from: &Path, to: &str) -> Vec<String> {
        let mut args = self.common_args("-P");
        args.push("-r".to_string());
        args.push(from.display().to_string());
        args.push(format!("{}:{to}", self.destination()));
        args
    }
}

fn run_checked(cmd: &str, args: &[String]) -> Result<()> {
    let status = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if !status.success() {
        match status.code() {
            Some(code) => anyhow::bail!("{cmd} exited with status {code}"),
            None => anyhow::bail!("{cmd} was terminated by a signal"),
        }
    }
    Ok(())
}

/// Run a local shell command, streaming its output
pub fn shell(command: &str) -> Result<()> {
    log::debug!("sh -c {command}");
    run_checked("sh", &["-c".to_string(), command.to_string()])
}

/// Run a command on a server, streaming its output
pub fn ssh(target: &SshTarget, command: &str) -> Result<()> {
    let args = target.ssh_args(command);
    log::debug!("ssh {}", args.join(" "));
    run_checked("ssh", &args)
}

/// Run a command on a server and report whether it exited with 0
///
/// Exit code 255 is ssh's own failure and is an error, not `false`.
pub fn ssh_succeeds(target: &SshTarget, command: &str) -> Result<bool> {
    let args = target.ssh_args(command);
    log::debug!("ssh {}", args.join(" "));
    let output = Command::new("ssh")
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: ssh {}", args.join(" ")))?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(255) | None => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ssh to {} failed: {}", target.host, stderr.trim())
        }
        Some(_) => Ok(false),
    }
}

/// Copy a local file or directory to a server
pub fn scp(target: &SshTarget, from: &Path, to: &str) -> Result<()> {
    let args = target.scp_args(from, to);
    log::debug!("scp {}", args.join(" "));
    run_checked("scp", &args)
}
