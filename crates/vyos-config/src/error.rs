//! Error types for configuration tree operations.
//!
//! Every fallible operation in this crate returns [`ConfigResult`]. A path
//! that does not resolve is never an error: lookups return `Option` and
//! deletes report [`DeleteOutcome::Absent`](crate::DeleteOutcome::Absent).

use std::io;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while parsing, mutating or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A line does not match any shape of the configuration grammar.
    #[error("unable to parse line {line}: '{}'", tokens.join(" "))]
    Parse {
        /// 1-based line number in the source text.
        line: usize,
        /// The whitespace-split tokens of the offending line.
        tokens: Vec<String>,
    },

    /// A `}` appeared with no open block.
    #[error("unbalanced '}}' at line {line}")]
    UnbalancedClose {
        /// 1-based line number of the stray brace.
        line: usize,
    },

    /// The text ended while blocks were still open.
    #[error("configuration ends with {depth} unclosed block(s)")]
    UnclosedBlock {
        /// Number of blocks left open.
        depth: usize,
    },

    /// A path argument is empty or too short for the operation.
    #[error("invalid configuration path '{path}': {reason}")]
    InvalidPath {
        /// The path as given by the caller.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// `value()` or `set()` was called on a node that is not a key node.
    #[error("the node[{path}] is not a key node")]
    NotKeyNode {
        /// Full path of the offending node.
        path: String,
    },

    /// Failed to spawn a shell command.
    #[error("failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned a non-zero exit code.
    #[error("shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Filesystem error while staging a session script.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConfigError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    /// Creates a not-a-key-node error.
    pub fn not_key_node(path: impl Into<String>) -> Self {
        Self::NotKeyNode { path: path.into() }
    }

    /// Returns true for errors caused by malformed configuration text.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ConfigError::Parse { .. }
                | ConfigError::UnbalancedClose { .. }
                | ConfigError::UnclosedBlock { .. }
        )
    }
}
