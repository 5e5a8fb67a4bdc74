//! The unit of work the engine executes

use std::fmt::Debug;

use crate::context::{CancellationToken, Notification, StatusReporter};
use crate::types::{RunSettings, ServerTarget};

/// A deployment step.
///
/// The engine treats steps as opaque: it only names them, runs them, renders
/// them for dry runs and asks them to validate. `server` is `None` in the
/// local phase.
///
/// Long-running steps should poll `token` and return
/// [`Error::Cancelled`](crate::Error::Cancelled) (wrapped in `anyhow`) when it
/// fires; the engine keeps that error distinct from a step failure.
pub trait Operation: Send + Sync + Debug {
    /// Display name, used as the reporting section name
    fn name(&self) -> String;

    /// Perform the step
    fn execute(
        &self,
        server: Option<&ServerTarget>,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
    ) -> anyhow::Result<()>;

    /// Describe what `execute` would do, without doing it
    fn dry_run(&self) -> String;

    /// Append problems to `notification`; `true` when there were none
    fn is_valid(&self, _notification: &mut Notification) -> bool {
        true
    }
}

/// Owned, type-erased operation
pub type BoxedOperation = Box<dyn Operation>;
