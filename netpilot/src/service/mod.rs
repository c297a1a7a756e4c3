//! The `Netpilot` service: every operation behind one handle.

mod builder;

pub use builder::NetpilotBuilder;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};

use crate::command::ConfigPayload;
use crate::error::{ConfigError, Error, Result};
use crate::exec::{CommandPipeline, ExecutionOutcome, InventoryOutcome};
use crate::script::{DEFAULT_SCRIPT_TIMEOUT, ScriptOutcome, ScriptRunner};
use crate::session::SessionCache;
use crate::settings::Settings;
use crate::topology::{TopologyCache, TopologySnapshot};

/// Device automation service.
///
/// Owns the testbed cache, the session cache, the command pipeline and the
/// script runner. Device operations never fail with `Err`: problems are
/// reported in the returned outcome.
pub struct Netpilot {
    topology: Arc<TopologyCache>,
    sessions: Arc<SessionCache>,
    pipeline: CommandPipeline,
    scripts: ScriptRunner,
}

impl Netpilot {
    pub fn builder() -> NetpilotBuilder {
        NetpilotBuilder::new()
    }

    /// Build with SSH devices and TextFSM parsing as the settings say.
    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        NetpilotBuilder::from_settings(settings).build()
    }

    /// Load the testbed now. Used at startup, where failure is fatal.
    pub async fn check_testbed(&self) -> Result<Arc<TopologySnapshot>> {
        let snapshot = self.topology.get().await?;
        info!(
            "Using testbed '{}' from {} ({} devices)",
            snapshot.name,
            self.topology.source(),
            snapshot.devices.len()
        );
        Ok(snapshot)
    }

    /// Every device in the testbed with its os, type, platform and
    /// connection names.
    pub async fn list_devices(&self) -> InventoryOutcome {
        match self.topology.get().await {
            Ok(snapshot) => InventoryOutcome::Completed {
                testbed: snapshot.name.clone(),
                devices: snapshot.summary(),
            },
            Err(e) => {
                error!("Failed to list devices: {}", e);
                let e = Error::from(e);
                InventoryOutcome::Error {
                    error: e.to_string(),
                    kind: e.kind(),
                }
            }
        }
    }

    /// Run a read-only `show` command.
    pub async fn show(&self, device: &str, command: &str) -> ExecutionOutcome {
        self.pipeline.show(device, command).await
    }

    /// Apply configuration given as lines or as one block.
    pub async fn configure(
        &self,
        device: &str,
        payload: impl Into<ConfigPayload>,
    ) -> ExecutionOutcome {
        self.pipeline.configure(device, &payload.into()).await
    }

    /// Apply configuration given as a JSON array of lines or a JSON string.
    pub async fn configure_json(
        &self,
        device: &str,
        payload: &serde_json::Value,
    ) -> ExecutionOutcome {
        self.pipeline
            .configure(device, &ConfigPayload::from_json(payload))
            .await
    }

    pub async fn learn_config(&self, device: &str) -> ExecutionOutcome {
        self.pipeline.learn_config(device).await
    }

    pub async fn learn_logging(&self, device: &str) -> ExecutionOutcome {
        self.pipeline.learn_logging(device).await
    }

    pub async fn ping(&self, device: &str, command: &str) -> ExecutionOutcome {
        self.pipeline.ping(device, command).await
    }

    pub async fn linux_command(&self, device: &str, command: &str) -> ExecutionOutcome {
        self.pipeline.linux_command(device, command).await
    }

    /// Run a test script with the default time limit.
    pub async fn run_test_script(&self, script: &str) -> ScriptOutcome {
        self.run_test_script_with_timeout(script, DEFAULT_SCRIPT_TIMEOUT)
            .await
    }

    pub async fn run_test_script_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> ScriptOutcome {
        let result = self.scripts.run(script, timeout).await;
        if let Err(e) = &result {
            error!("Test script run failed: {}", e);
        }
        ScriptOutcome::from(result)
    }

    /// Disconnect every cached session.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn pipeline(&self) -> &CommandPipeline {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{CountingLoader, FakeFactory, FakeSpawner};

    const TESTBED: &str = r#"
testbed:
  name: lab
  credentials:
    default: { username: admin, password: admin }
devices:
  R1:
    os: iosxe
    type: router
    platform: cat8k
    connections:
      cli: { protocol: ssh, ip: 10.0.0.1 }
  srv1:
    os: linux
    type: server
    connections:
      ssh: { host: srv1.lab }
"#;

    fn testbed_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TESTBED.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_list_devices() {
        let testbed = testbed_file();
        let artifacts = tempfile::tempdir().unwrap();
        let netpilot = Netpilot::builder()
            .testbed(testbed.path())
            .artifacts_dir(artifacts.path())
            .device_factory(Arc::new(FakeFactory::new()))
            .build()
            .unwrap();

        let json = netpilot.list_devices().await.to_json();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["testbed"], "lab");
        assert_eq!(
            json["devices"]["R1"],
            json!({
                "os": "iosxe",
                "type": "router",
                "platform": "cat8k",
                "connections": ["cli"],
            })
        );
        assert_eq!(json["devices"]["srv1"]["connections"], json!(["ssh"]));
    }

    #[tokio::test]
    async fn test_list_devices_reports_load_failure() {
        let artifacts = tempfile::tempdir().unwrap();
        let netpilot = Netpilot::builder()
            .testbed("/nonexistent/testbed.yaml")
            .artifacts_dir(artifacts.path())
            .build()
            .unwrap();

        match netpilot.list_devices().await {
            InventoryOutcome::Error { kind, error } => {
                assert_eq!(kind, ErrorKind::Load);
                assert!(error.contains("/nonexistent/testbed.yaml"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(netpilot.check_testbed().await.is_err());
    }

    #[tokio::test]
    async fn test_operations_end_to_end() {
        let artifacts = tempfile::tempdir().unwrap();
        let factory = Arc::new(FakeFactory::new());
        let netpilot = Netpilot::builder()
            .loader(Arc::new(CountingLoader::with_devices(&[
                ("R1", "iosxe"),
                ("srv1", "linux"),
            ])))
            .device_factory(factory.clone())
            .conn_cache_ttl(Duration::from_secs(300))
            .artifacts_dir(artifacts.path())
            .build()
            .unwrap();

        assert!(netpilot.show("R1", "show ip interface brief").await.is_completed());
        assert!(
            netpilot
                .configure("R1", vec!["hostname R1".to_string()])
                .await
                .is_completed()
        );
        assert!(
            netpilot
                .configure_json("R1", &json!("conf t\nntp server 10.0.0.5\nend"))
                .await
                .is_completed()
        );
        assert!(netpilot.learn_config("R1").await.is_completed());
        assert!(netpilot.linux_command("srv1", "df -h").await.is_completed());

        assert_eq!(factory.connects(), 2);
        assert_eq!(
            factory.configured(),
            vec![
                vec!["hostname R1".to_string()],
                vec!["ntp server 10.0.0.5".to_string()],
            ]
        );
        assert_eq!(netpilot.sessions().cached_devices(), vec!["R1", "srv1"]);

        netpilot.shutdown().await;
        assert_eq!(factory.disconnects(), 2);
        assert!(netpilot.sessions().cached_devices().is_empty());
    }

    #[tokio::test]
    async fn test_run_test_script() {
        let testbed = testbed_file();
        let artifacts = tempfile::tempdir().unwrap();
        let spawner = Arc::new(FakeSpawner::new(0, "Overall result: PASSED", Some("{}")));
        let netpilot = Netpilot::builder()
            .testbed(testbed.path())
            .artifacts_dir(artifacts.path())
            .process_spawner(spawner.clone())
            .build()
            .unwrap();

        let outcome = netpilot.run_test_script("from pyats import aetest\n").await;
        assert!(outcome.is_completed());
        assert_eq!(
            spawner.specs()[0].env[0].1,
            testbed.path().display().to_string()
        );

        let outcome = netpilot.run_test_script("import paramiko").await;
        let json = outcome.to_json();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["error"], "Script contains banned import: paramiko");
    }

    #[test]
    fn test_build_requires_testbed() {
        assert!(matches!(
            Netpilot::builder().build(),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_from_settings() {
        let testbed = testbed_file();
        let artifacts = tempfile::tempdir().unwrap();
        let settings = Settings {
            testbed_path: testbed.path().to_path_buf(),
            artifacts_dir: artifacts.path().to_path_buf(),
            keep_artifacts: false,
            testbed_cache_ttl: Duration::from_secs(10),
            conn_cache_ttl: Duration::from_secs(60),
            template_dir: None,
            test_runner: "pyats".into(),
        };
        let netpilot = Netpilot::from_settings(&settings).unwrap();
        assert_eq!(netpilot.sessions().ttl(), Duration::from_secs(60));
    }
}
