//! Path resolution for stagehand
//!
//! # Environment Variables
//!
//! - `STAGEHAND_CONFIG` - Deployment file to use when `--config` is not given
//! - `STAGEHAND_STATE_DIR` - Override state directory (run logs)
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `--config` flag
//! 2. `STAGEHAND_CONFIG` environment variable
//! 3. `./stagehand.toml`
//!
//! For state_dir():
//! 1. `STAGEHAND_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/stagehand` (if set)
//! 3. `~/.local/state/stagehand`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the deployment file
pub const ENV_CONFIG: &str = "STAGEHAND_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STAGEHAND_STATE_DIR";

/// File looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "stagehand.toml";

/// Resolve the deployment file
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return expand(&path.to_string_lossy());
    }

    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return path;
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Get the stagehand state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("stagehand");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("stagehand");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Directory holding per-run log files
pub fn runs_dir() -> Result<PathBuf> {
    Ok(state_dir()?.join("runs"))
}

/// Expand `~` and environment variables in a path
///
/// Unknown variables are left as they are.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
