use thiserror::Error;

/// Errors raised while resolving or talking to a load balancer.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured mode is not one of the supported modes
    #[error("Load Balancer mode [{0}] not supported.")]
    UnsupportedMode(String),

    /// No provider is registered under the configured name
    #[error("unknown load balancer provider '{name}' (available: {available})")]
    UnknownProvider {
        /// Name from the configuration
        name: String,
        /// Comma-separated list of registered providers
        available: String,
    },

    /// Provider configuration is missing or malformed
    #[error("invalid load balancer configuration: {0}")]
    InvalidConfig(String),

    /// A suspend/resume command exited unsuccessfully
    #[error("load balancer command `{command}` failed: {stderr}")]
    CommandFailed {
        /// The expanded command line
        command: String,
        /// Trimmed stderr of the command
        stderr: String,
    },

    /// HTTP request to the balancer API failed
    #[error("load balancer request failed: {message}")]
    Http {
        /// Error message
        message: String,
        /// HTTP status code if available
        status: Option<u16>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error comes from configuration rather than from a call.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedMode(_) | Error::UnknownProvider { .. } | Error::InvalidConfig(_)
        )
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

/// Result type for balancer operations.
pub type Result<T> = std::result::Result<T, Error>;
