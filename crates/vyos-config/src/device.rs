//! The managed device: read its configuration, apply change logs to it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::ConfigResult;
use crate::interfaces;
use crate::parser::parse;
use crate::script::{ScriptConfig, ScriptRunner, VyosScriptRunner};
use crate::source::{ConfigSource, ShowConfigSource};
use crate::tree::ConfigTree;

/// Source of configuration snapshots paired with the sink for changes.
///
/// Nothing is cached: every [`Device::load_tree`] reads the device again.
#[derive(Clone)]
pub struct Device {
    source: Arc<dyn ConfigSource>,
    runner: Arc<dyn ScriptRunner>,
}

impl Device {
    /// Creates a device from an explicit source and runner.
    pub fn new(source: Arc<dyn ConfigSource>, runner: Arc<dyn ScriptRunner>) -> Self {
        Self { source, runner }
    }

    /// A live VyOS device reached through `cli-shell-api`.
    pub fn vyos(config: ScriptConfig) -> Self {
        let source = ShowConfigSource::new(config.api.clone());
        Self::new(Arc::new(source), Arc::new(VyosScriptRunner::new(config)))
    }

    /// Reads and parses the current configuration into a fresh tree.
    #[instrument(skip(self))]
    pub async fn load_tree(&self) -> ConfigResult<ConfigTree> {
        let text = self.source.fetch().await?;
        parse(&text)
    }

    /// Applies the tree's change log as one session, consuming the tree.
    ///
    /// Returns the number of primitive commands executed. A tree without
    /// changes never opens a session.
    #[instrument(skip(self, tree))]
    pub async fn apply(&self, tree: ConfigTree) -> ConfigResult<usize> {
        let changes = tree.into_changes();
        if changes.is_empty() {
            debug!("No configuration changes to apply");
            return Ok(0);
        }
        self.runner.run(&changes).await?;
        Ok(changes.len())
    }

    /// Finds the ethernet interface whose `hw-id` matches `mac`.
    pub async fn nic_name_by_mac(&self, mac: &str) -> ConfigResult<Option<String>> {
        let tree = self.load_tree().await?;
        Ok(interfaces::find_nic_name_by_mac(&tree, mac))
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticConfigSource;
    use crate::tree::ChangeCommand;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingRunner {
        runs: Mutex<Vec<Vec<ChangeCommand>>>,
    }

    #[async_trait]
    impl ScriptRunner for CapturingRunner {
        async fn run(&self, changes: &[ChangeCommand]) -> ConfigResult<()> {
            self.runs.lock().unwrap().push(changes.to_vec());
            Ok(())
        }
    }

    const CONFIG: &str = r#"
interfaces {
    ethernet eth0 {
        hw-id 00:0c:29:aa:bb:cc
    }
}
system {
    host-name vyos
}
"#;

    fn device() -> (Device, Arc<CapturingRunner>) {
        let runner = Arc::new(CapturingRunner::default());
        let device = Device::new(Arc::new(StaticConfigSource::new(CONFIG)), runner.clone());
        (device, runner)
    }

    #[tokio::test]
    async fn test_apply_runs_change_log() {
        let (device, runner) = device();
        let mut tree = device.load_tree().await.unwrap();
        tree.set("system host-name router1").unwrap();

        assert_eq!(device.apply(tree).await.unwrap(), 2);

        let runs = runner.runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0],
            vec![
                ChangeCommand::Delete("system host-name".to_string()),
                ChangeCommand::Set("system host-name router1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_without_changes_skips_session() {
        let (device, runner) = device();
        let mut tree = device.load_tree().await.unwrap();
        tree.set("system host-name vyos").unwrap();

        assert_eq!(device.apply(tree).await.unwrap(), 0);
        assert!(runner.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_tree_is_fresh_each_time() {
        let (device, _) = device();
        let mut first = device.load_tree().await.unwrap();
        first.delete("system");

        let second = device.load_tree().await.unwrap();
        assert!(second.has("system host-name vyos"));
        assert!(!second.has_changes());
    }

    #[tokio::test]
    async fn test_nic_name_by_mac() {
        let (device, _) = device();
        assert_eq!(
            device.nic_name_by_mac("00:0C:29:AA:BB:CC").await.unwrap(),
            Some("eth0".to_string())
        );
    }
}
