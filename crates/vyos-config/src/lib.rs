//! Configuration tree engine for VyOS-based virtual routers.
//!
//! This crate turns the device's running configuration into an editable
//! tree and turns the edits back into a device session:
//!
//! - [`parse`]: brace grammar text into a [`ConfigTree`]
//! - [`ConfigTree`]: query and mutate, with an append-only change log
//! - [`script`]: render a change log into a session script and run it
//! - [`Device`]: read → parse and apply, over pluggable source and runner
//! - [`shell`]: command execution with proper quoting
//!
//! # Architecture
//!
//! Every request works on its own tree:
//!
//! 1. `cli-shell-api showCfg` dumps the running configuration
//! 2. The text is parsed into a fresh tree (no cross-request cache)
//! 3. Business logic calls `get`/`set`/`delete`; each effective change is
//!    recorded as `$SET <path>` or `$DELETE <path>`
//! 4. The change log runs as one session, committed once
//!
//! # Example
//!
//! ```ignore
//! use zvr_vyos_config::{Device, ScriptConfig};
//!
//! let device = Device::vyos(ScriptConfig::default());
//! let mut tree = device.load_tree().await?;
//! tree.set("nat source rule 100 outbound-interface eth0")?;
//! tree.set("nat source rule 100 source address 10.0.0.0/24")?;
//! tree.set("nat source rule 100 translation address masquerade")?;
//! device.apply(tree).await?;
//! ```

pub mod device;
pub mod error;
pub mod interfaces;
pub mod parser;
pub mod script;
pub mod shell;
pub mod source;
pub mod tree;

// Re-export commonly used items at crate root
pub use device::Device;
pub use error::{ConfigError, ConfigResult};
pub use interfaces::find_nic_name_by_mac;
pub use parser::parse;
pub use script::{render_script, ScriptConfig, ScriptRunner, VyosScriptRunner};
pub use source::{ConfigSource, ShowConfigSource, StaticConfigSource};
pub use tree::{ChangeCommand, ConfigTree, DeleteOutcome, NodeId, NodeRef, SetOutcome};
