//! Agent configuration file support.
//!
//! Loads and validates zvrd settings from TOML. Every field has a default so
//! a partial file (or none at all) is valid; command-line flags are applied
//! on top by `main`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zvr_vyos_config::ScriptConfig;

use crate::error::{AgentError, AgentResult};

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind; must be set from the file or `--ip`
    #[serde(default)]
    pub ip: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds allowed for a request body to arrive
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Async result delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Delivery attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    /// Per-POST timeout in seconds
    #[serde(default = "default_callback_timeout")]
    pub timeout_secs: u64,
}

/// Device session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VyosConfig {
    /// Account the session script runs as
    #[serde(default = "default_user")]
    pub user: String,

    /// Group owning the staged script
    #[serde(default = "default_group")]
    pub group: String,

    /// Directory holding the vyatta helper scripts
    #[serde(default = "default_sbin_dir")]
    pub sbin_dir: String,

    /// Path of the configuration API binary
    #[serde(default = "default_api")]
    pub api: String,

    /// Where scripts are staged; system temp dir when unset
    #[serde(default)]
    pub script_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete zvrd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub callback: CallbackConfig,

    #[serde(default)]
    pub vyos: VyosConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_port() -> u16 {
    7272
}

fn default_read_timeout() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    15
}

fn default_retry_interval() -> u64 {
    1000
}

fn default_callback_timeout() -> u64 {
    10
}

fn default_user() -> String {
    "vyos".to_string()
}

fn default_group() -> String {
    "users".to_string()
}

fn default_sbin_dir() -> String {
    zvr_vyos_config::shell::VYATTA_SBIN_DIR.to_string()
}

fn default_api() -> String {
    zvr_vyos_config::shell::CLI_SHELL_API.to_string()
}

fn default_log_level() -> String {
    "debug".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: String::new(),
            port: default_port(),
            read_timeout_secs: default_read_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval(),
            timeout_secs: default_callback_timeout(),
        }
    }
}

impl Default for VyosConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            group: default_group(),
            sbin_dir: default_sbin_dir(),
            api: default_api(),
            script_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AgentConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> AgentResult<Self> {
        toml::from_str(content)
            .map_err(|e| AgentError::config(format!("failed to parse config: {}", e)))
    }

    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            AgentError::config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Read timeout for request bodies
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }

    /// Socket address to listen on
    pub fn listen_addr(&self) -> AgentResult<SocketAddr> {
        format!("{}:{}", self.server.ip, self.server.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{}]:{}", self.server.ip, self.server.port).parse::<SocketAddr>())
            .map_err(|_| AgentError::config(format!("invalid listen ip '{}'", self.server.ip)))
    }

    /// Session script settings for the device runner
    pub fn script_config(&self) -> ScriptConfig {
        ScriptConfig {
            user: self.vyos.user.clone(),
            group: self.vyos.group.clone(),
            sbin_dir: self.vyos.sbin_dir.clone(),
            api: self.vyos.api.clone(),
            script_dir: self.vyos.script_dir.clone(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AgentResult<()> {
        if self.server.ip.trim().is_empty() {
            return Err(AgentError::config("ip is required, use --ip or [server].ip"));
        }

        if self.server.port == 0 {
            return Err(AgentError::config("port must be > 0"));
        }

        if self.callback.max_attempts == 0 {
            return Err(AgentError::config("callback max_attempts must be > 0"));
        }

        self.listen_addr().map(|_| ())
    }
}
