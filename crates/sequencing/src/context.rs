//! Run context: status reporting, validation diagnostics and cancellation
//!
//! These types are passed explicitly through every call. Nothing here is
//! global: a reporter tracks its own nesting depth.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Sink for progress events
///
/// The engine only writes to it and never branches on its state. Sections
/// are named scopes that nest: every `section_start` is matched by a
/// `section_end` with the same name.
pub trait StatusReporter {
    /// A named scope begins
    fn section_start(&mut self, name: &str);

    /// The innermost scope ends
    fn section_end(&mut self, name: &str, success: bool);

    /// Informational message inside the current scope
    fn info(&mut self, message: &str);

    /// Warning inside the current scope
    fn warn(&mut self, message: &str);
}

/// Run `f` inside a named section, closing it with the outcome
pub fn with_section<T, E>(
    status: &mut dyn StatusReporter,
    name: &str,
    f: impl FnOnce(&mut dyn StatusReporter) -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    status.section_start(name);
    let result = f(&mut *status);
    status.section_end(name, result.is_ok());
    result
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatus;

impl StatusReporter for NoStatus {
    fn section_start(&mut self, _name: &str) {}
    fn section_end(&mut self, _name: &str, _success: bool) {}
    fn info(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
}

/// Reporter that forwards to the `log` facade with indentation
#[derive(Debug, Default)]
pub struct LogStatus {
    depth: usize,
}

impl LogStatus {
    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }
}

impl StatusReporter for LogStatus {
    fn section_start(&mut self, name: &str) {
        log::info!("{}{}", self.indent(), name);
        self.depth += 1;
    }

    fn section_end(&mut self, name: &str, success: bool) {
        self.depth = self.depth.saturating_sub(1);
        if !success {
            log::debug!("{}{} failed", self.indent(), name);
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{}{}", self.indent(), message);
    }

    fn warn(&mut self, message: &str) {
        log::warn!("{}{}", self.indent(), message);
    }
}

/// One validation diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// What reported the problem (operation or sequence name)
    pub source: String,
    /// What is wrong
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Accumulator for validation diagnostics.
///
/// Validation never fails fast: every invalid item appends here and the
/// caller inspects the result afterwards.
#[derive(Debug, Clone, Default)]
pub struct Notification {
    errors: Vec<ValidationError>,
}

impl Notification {
    /// Create an empty notification
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem
    pub fn add_error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            source: source.into(),
            message: message.into(),
        });
    }

    /// Whether anything was recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All recorded problems, in the order they were found
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }
}

/// Cooperative cancellation flag shared between the run and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the next check point
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check point: fail with [`Error::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStatus;

    #[test]
    fn with_section_reports_outcome() {
        let mut status = RecordingStatus::default();

        let ok: std::result::Result<u8, ()> = with_section(&mut status, "ok", |_| Ok(1));
        let err: std::result::Result<u8, ()> = with_section(&mut status, "bad", |_| Err(()));

        assert_eq!(ok, Ok(1));
        assert!(err.is_err());
        assert_eq!(
            status.lines,
            vec!["start ok", "end ok (ok)", "start bad", "end bad (failed)"]
        );
    }

    #[test]
    fn sections_nest() {
        let mut status = RecordingStatus::default();
        let _: std::result::Result<(), ()> = with_section(&mut status, "outer", |status| {
            with_section(status, "inner", |status| {
                status.info("hello");
                Ok(())
            })
        });

        assert_eq!(
            status.lines,
            vec![
                "start outer",
                "start inner",
                "info hello",
                "end inner (ok)",
                "end outer (ok)"
            ]
        );
    }

    #[test]
    fn log_status_depth_never_underflows() {
        let mut status = LogStatus::default();
        status.section_end("stray", true);
        status.section_start("a");
        assert_eq!(status.depth, 1);
        status.section_end("a", true);
        assert_eq!(status.depth, 0);
    }

    #[test]
    fn notification_collects_in_order() {
        let mut notification = Notification::new();
        assert!(!notification.has_errors());

        notification.add_error("upload", "source missing");
        notification.add_error("run", "empty command");

        assert!(notification.has_errors());
        let rendered: Vec<String> = notification.errors().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["upload: source missing", "run: empty command"]);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(token.check().is_ok());

        handle.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().unwrap_err().is_cancelled());
    }
}
