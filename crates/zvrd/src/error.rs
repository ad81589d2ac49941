//! Error types for the agent.
//!
//! Failures raised inside a command handler never escape the dispatcher:
//! they are turned into a `{"success": false, "error": ...}` reply by the
//! per-request failure boundary. Only registration errors are fatal, and
//! only at startup.

use std::io;
use thiserror::Error;
use zvr_vyos_config::ConfigError;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur in the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A second handler was registered for a path.
    #[error("duplicate handler for the path[{0}]")]
    DuplicatePath(String),

    /// A handler was registered with an empty path.
    #[error("command path cannot be empty")]
    EmptyPath,

    /// An async command arrived without a required correlation header.
    #[error(
        "no field '{header}' found in the HTTP header but the plugin registers \
         the path[{path}] as an async command"
    )]
    MissingHeader {
        /// The missing header name.
        header: &'static str,
        /// The request path.
        path: String,
    },

    /// The request body is not the JSON the handler expects.
    #[error("invalid command body: {0}")]
    InvalidCommand(#[from] serde_json::Error),

    /// Reading, parsing or applying the device configuration failed.
    #[error(transparent)]
    Device(#[from] ConfigError),

    /// A handler rejected the command.
    #[error("{0}")]
    Handler(String),

    /// A handler panicked; the panic was contained by the dispatcher.
    #[error("command panicked: {0}")]
    Panicked(String),

    /// Result delivery to the callback URL failed.
    #[error("failed to deliver callback to {url}: {message}")]
    Callback {
        /// The callback URL.
        url: String,
        /// Last delivery error.
        message: String,
    },

    /// Agent configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl AgentError {
    /// Creates a handler error from any message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
