//! Commands every agent serves regardless of installed plugins.

use serde_json::json;

use crate::dispatcher::DispatcherBuilder;
use crate::error::AgentResult;
use crate::handler::{handler_fn, CommandContext};

/// Liveness check; replies with an empty body.
pub const ECHO_PATH: &str = "/echo";

/// Dumps the running configuration as seen by the tree engine.
pub const CONFIGURATION_PATH: &str = "/configuration";

/// Registers the built-in commands.
///
/// Both are read-only and run without the device lock.
pub fn register_builtin_commands(builder: &mut DispatcherBuilder) -> AgentResult<()> {
    builder.register_sync(ECHO_PATH, handler_fn(|_ctx: CommandContext| async { Ok(None) }))?;

    builder.register_sync(
        CONFIGURATION_PATH,
        handler_fn(|ctx: CommandContext| async move {
            let tree = ctx.device().load_tree().await?;
            Ok(Some(json!({
                "success": true,
                "configuration": tree.serialize(),
            })))
        }),
    )?;

    Ok(())
}
