//! Where configuration text comes from.

use async_trait::async_trait;

use crate::error::ConfigResult;
use crate::shell::{self, shellquote, CLI_SHELL_API};

/// Supplies a snapshot of the device configuration in brace grammar.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Returns the current configuration text.
    async fn fetch(&self) -> ConfigResult<String>;
}

/// Reads the running configuration with `cli-shell-api showCfg`.
#[derive(Debug, Clone)]
pub struct ShowConfigSource {
    api: String,
}

impl ShowConfigSource {
    /// Uses the given `cli-shell-api` binary.
    pub fn new(api: impl Into<String>) -> Self {
        Self { api: api.into() }
    }

    /// The dump command this source runs.
    pub fn command(&self) -> String {
        format!("{} showCfg", shellquote(&self.api))
    }
}

impl Default for ShowConfigSource {
    fn default() -> Self {
        Self::new(CLI_SHELL_API)
    }
}

#[async_trait]
impl ConfigSource for ShowConfigSource {
    async fn fetch(&self) -> ConfigResult<String> {
        shell::exec_or_throw(&self.command()).await
    }
}

/// Serves fixed text; used by tests and offline tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    text: String,
}

impl StaticConfigSource {
    /// Serves `text` on every fetch.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch(&self) -> ConfigResult<String> {
        Ok(self.text.clone())
    }
}
