//! Session script rendering and execution.
//!
//! A change log is applied as one VyOS configuration session: the script
//! opens a session through `cli-shell-api`, runs one `my_set`/`my_delete`
//! call per change in log order, and commits once. The session is torn
//! down by an EXIT trap that is installed before the session is opened, so
//! a failed commit or a termination signal still releases it.
//!
//! The script is staged in a temporary file, handed to the `vyos` user and
//! run through `su`. The file is removed when the run finishes, whatever
//! the outcome.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::ConfigResult;
use crate::shell::{self, shellquote, CLI_SHELL_API, VYATTA_SBIN_DIR};
use crate::tree::ChangeCommand;

/// Prefix of staged script files.
const SCRIPT_PREFIX: &str = "zvr";

/// Settings for running session scripts on the device.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// System user the script runs as.
    pub user: String,
    /// Group owning the staged script.
    pub group: String,
    /// Directory holding the session helper binaries.
    pub sbin_dir: String,
    /// Path to `cli-shell-api`.
    pub api: String,
    /// Where to stage scripts; the system temp dir if unset.
    pub script_dir: Option<PathBuf>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            user: "vyos".to_string(),
            group: "users".to_string(),
            sbin_dir: VYATTA_SBIN_DIR.to_string(),
            api: CLI_SHELL_API.to_string(),
            script_dir: None,
        }
    }
}

/// Renders a change log into a complete session script.
pub fn render_script(config: &ScriptConfig, changes: &[ChangeCommand]) -> String {
    let commands = changes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"#!/bin/bash
vyatta_sbindir={sbin_dir}
SET=${{vyatta_sbindir}}/my_set
DELETE=${{vyatta_sbindir}}/my_delete
COPY=${{vyatta_sbindir}}/my_copy
MOVE=${{vyatta_sbindir}}/my_move
RENAME=${{vyatta_sbindir}}/my_rename
ACTIVATE=${{vyatta_sbindir}}/my_activate
DEACTIVATE=${{vyatta_sbindir}}/my_deactivate
COMMENT=${{vyatta_sbindir}}/my_comment
COMMIT=${{vyatta_sbindir}}/my_commit
DISCARD=${{vyatta_sbindir}}/my_discard
SAVE=${{vyatta_sbindir}}/vyatta-save-config.pl
API={api}

function atexit() {{
    $API teardownSession
}}

trap atexit EXIT
trap 'exit 1' SIGHUP SIGINT SIGTERM

session_env=$($API getSessionEnv $PPID)
echo $session_env
eval $session_env
$API setupSession

{commands}
$COMMIT
if [ $? -ne 0 ]; then
    echo "fail to commit"
    exit 1
fi
"#,
        sbin_dir = config.sbin_dir,
        api = config.api,
        commands = commands,
    )
}

/// Builds the command that hands a staged script to `user` and runs it.
pub fn build_run_script_cmd(script: &Path, user: &str, group: &str) -> String {
    let path = shellquote(&script.to_string_lossy());
    format!(
        "chown {owner} {path}; chmod +x {path}; su - {user} -c {path}",
        owner = shellquote(&format!("{}:{}", user, group)),
        path = path,
        user = shellquote(user),
    )
}

/// Executes a change log against the device.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Applies all changes as one session; any failure fails the whole run.
    async fn run(&self, changes: &[ChangeCommand]) -> ConfigResult<()>;
}

/// Runs session scripts through the VyOS session helpers.
#[derive(Debug, Clone, Default)]
pub struct VyosScriptRunner {
    config: ScriptConfig,
}

impl VyosScriptRunner {
    /// Creates a runner with the given settings.
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    /// The runner's settings.
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    fn stage(&self, script: &str) -> ConfigResult<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRIPT_PREFIX);
        let file = match &self.config.script_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        std::fs::write(file.path(), script)?;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755))?;
        Ok(file)
    }
}

#[async_trait]
impl ScriptRunner for VyosScriptRunner {
    #[instrument(skip(self, changes), fields(changes = changes.len()))]
    async fn run(&self, changes: &[ChangeCommand]) -> ConfigResult<()> {
        let script = render_script(&self.config, changes);
        debug!("{}", script);

        let file = self.stage(&script)?;
        let cmd = build_run_script_cmd(file.path(), &self.config.user, &self.config.group);
        let result = shell::exec_or_throw(&cmd).await;

        if let Err(e) = file.close() {
            warn!(error = %e, "Failed to remove session script");
        }

        let output = result?;
        info!(changes = changes.len(), "Applied configuration session");
        debug!(output = %output, "Session script output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn sample_changes() -> Vec<ChangeCommand> {
        vec![
            ChangeCommand::Delete("system host-name".to_string()),
            ChangeCommand::Set("system host-name router1".to_string()),
            ChangeCommand::Set("service ssh port 22".to_string()),
        ]
    }

    #[test]
    fn test_render_binds_aliases() {
        let script = render_script(&ScriptConfig::default(), &[]);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("vyatta_sbindir=/opt/vyatta/sbin"));
        assert!(script.contains("SET=${vyatta_sbindir}/my_set"));
        assert!(script.contains("DELETE=${vyatta_sbindir}/my_delete"));
        assert!(script.contains("RENAME=${vyatta_sbindir}/my_rename"));
        assert!(script.contains("ACTIVATE=${vyatta_sbindir}/my_activate"));
        assert!(script.contains("DISCARD=${vyatta_sbindir}/my_discard"));
        assert!(script.contains("SAVE=${vyatta_sbindir}/vyatta-save-config.pl"));
        assert!(script.contains("API=/bin/cli-shell-api"));
    }

    #[test]
    fn test_render_commands_in_log_order() {
        let script = render_script(&ScriptConfig::default(), &sample_changes());

        let delete = script.find("$DELETE system host-name\n").unwrap();
        let set = script.find("$SET system host-name router1\n").unwrap();
        let ssh = script.find("$SET service ssh port 22\n").unwrap();
        let commit = script.find("\n$COMMIT\n").unwrap();
        assert!(delete < set && set < ssh && ssh < commit);
        assert_eq!(script.matches("\n$COMMIT\n").count(), 1);
    }

    #[test]
    fn test_render_installs_teardown_before_session() {
        let script = render_script(&ScriptConfig::default(), &sample_changes());

        let trap = script.find("trap atexit EXIT").unwrap();
        let signals = script.find("trap 'exit 1' SIGHUP SIGINT SIGTERM").unwrap();
        let setup = script.find("$API setupSession").unwrap();
        assert!(trap < setup);
        assert!(signals < setup);
        assert!(script.contains("$API teardownSession"));
        assert!(script.contains("echo \"fail to commit\"\n    exit 1"));
    }

    #[test]
    fn test_build_run_script_cmd() {
        let cmd = build_run_script_cmd(Path::new("/tmp/zvr123"), "vyos", "users");
        assert_eq!(
            cmd,
            "chown \"vyos:users\" \"/tmp/zvr123\"; chmod +x \"/tmp/zvr123\"; su - \"vyos\" -c \"/tmp/zvr123\""
        );
    }

    #[tokio::test]
    async fn test_failed_run_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let runner = VyosScriptRunner::new(ScriptConfig {
            user: "zvr-no-such-user".to_string(),
            script_dir: Some(dir.path().to_path_buf()),
            ..ScriptConfig::default()
        });

        let result = runner.run(&sample_changes()).await;

        assert!(matches!(
            result,
            Err(ConfigError::ShellCommandFailed { .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
