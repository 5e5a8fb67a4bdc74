//! Terminal status output, mirrored into a per-run log file

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use sequencing::StatusReporter;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Plain-text log of one run
pub struct RunLog {
    path: PathBuf,
    file: BufWriter<File>,
    broken: bool,
}

impl RunLog {
    /// Create a new log file named after the current time
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create log directory: {}", dir.display()))?;

        let name = format!("{}.log", Local::now().format("%Y%m%dT%H%M%S%.3f"));
        let path = dir.join(name);
        let file = File::create(&path)
            .with_context(|| format!("Could not create run log: {}", path.display()))?;

        Ok(Self {
            path,
            file: BufWriter::new(file),
            broken: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, depth: usize, line: &str) {
        if self.broken {
            return;
        }
        let stamp = Local::now().format("%H:%M:%S");
        let result = writeln!(self.file, "[{stamp}] {}{line}", indent(depth))
            .and_then(|()| self.file.flush());
        if let Err(err) = result {
            log::warn!("Could not write run log {}: {err}", self.path.display());
            self.broken = true;
        }
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Status reporter printing nested sections to the terminal
pub struct TerminalReporter {
    depth: usize,
    quiet: bool,
    log: Option<RunLog>,
}

impl TerminalReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            depth: 0,
            quiet,
            log: None,
        }
    }

    /// Also write every event to `log`
    pub fn with_log(mut self, log: RunLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(RunLog::path)
    }

    fn record(&mut self, line: &str) {
        if let Some(log) = &mut self.log {
            log.write_line(self.depth, line);
        }
    }
}

impl StatusReporter for TerminalReporter {
    fn section_start(&mut self, name: &str) {
        if !self.quiet {
            if self.depth == 0 {
                println!();
            }
            println!("{}{} {}", indent(self.depth), "▸".cyan(), name.bold());
        }
        self.record(&format!("> {name}"));
        self.depth += 1;
    }

    fn section_end(&mut self, name: &str, success: bool) {
        self.depth = self.depth.saturating_sub(1);
        if success {
            self.record(&format!("< {name}"));
        } else {
            eprintln!("{}{} {}", indent(self.depth), "✗".red(), name.red());
            self.record(&format!("< {name} FAILED"));
        }
    }

    fn info(&mut self, message: &str) {
        if !self.quiet {
            println!("{}{}", indent(self.depth), message.dimmed());
        }
        self.record(message);
    }

    fn warn(&mut self, message: &str) {
        println!("{}{} {}", indent(self.depth), "⚠".yellow(), message);
        self.record(&format!("WARN {message}"));
    }
}
