use thiserror::Error;

/// Errors that abort a deployment run.
///
/// Validation problems are not errors: they are collected into a
/// [`Notification`](crate::Notification).
#[derive(Debug, Error)]
pub enum Error {
    /// Cancellation was requested and observed at a check point
    #[error("run cancelled")]
    Cancelled,

    /// A deployment step failed
    #[error("operation '{operation}' failed on {target}: {source}")]
    Operation {
        /// Name of the failing operation
        operation: String,
        /// Server name, or "local" for the local phase
        target: String,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// The external balancer rejected a suspend or resume call
    #[error("failed to take server [{server}] {direction} in load balancer: {source}")]
    LoadBalancer {
        /// Server being transitioned
        server: String,
        /// "offline" or "online"
        direction: &'static str,
        /// Provider error
        #[source]
        source: balancer::Error,
    },

    /// A condition expression could not be evaluated
    #[error("condition '{condition}' could not be evaluated on [{server}]: {source}")]
    Condition {
        /// Condition description
        condition: String,
        /// Server the condition was evaluated against
        server: String,
        /// Evaluator failure
        #[source]
        source: anyhow::Error,
    },

    /// A conditional sequence was reached without a target server
    #[error("conditional sequence '{0}' needs a target server")]
    ConditionWithoutServer(String),

    /// More than one server carries the stop marker
    #[error("more than one server is marked as stop server: {}", .0.join(", "))]
    AmbiguousMarkedServer(Vec<String>),

    /// Load balancer configuration could not be resolved
    #[error(transparent)]
    Config(#[from] balancer::Error),
}

impl Error {
    /// Whether the run stopped because cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the error was raised before anything executed
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::AmbiguousMarkedServer(_))
    }

    /// Wrap an operation failure, keeping engine errors raised from inside it
    pub(crate) fn from_operation(operation: &str, target: Option<&str>, source: anyhow::Error) -> Self {
        match source.downcast::<Error>() {
            Ok(inner) => inner,
            Err(source) => Self::Operation {
                operation: operation.to_string(),
                target: target.unwrap_or("local").to_string(),
                source,
            },
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
