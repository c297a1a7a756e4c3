//! Testbed descriptor loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use super::{Credential, DeviceSpec, TopologySnapshot};
use crate::error::TopologyError;

/// Source of topology snapshots.
#[async_trait]
pub trait TopologyLoader: Send + Sync {
    /// Read and parse the descriptor.
    async fn load(&self) -> Result<TopologySnapshot, TopologyError>;

    /// Human-readable origin of the descriptor, used in error messages.
    fn source(&self) -> String;
}

/// Loads a pyATS-style testbed YAML file.
///
/// ```yaml
/// testbed:
///   name: lab
///   credentials:
///     default: { username: admin, password: admin }
/// devices:
///   R1:
///     os: iosxe
///     type: router
///     connections:
///       cli: { protocol: ssh, ip: 10.0.0.1, port: 22 }
/// ```
#[derive(Debug, Clone)]
pub struct YamlTopologyLoader {
    path: PathBuf,
}

impl YamlTopologyLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TopologyLoader for YamlTopologyLoader {
    async fn load(&self) -> Result<TopologySnapshot, TopologyError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TopologyError::Read {
                path: self.path.clone(),
                source,
            })?;

        let snapshot = parse_testbed(&text, &self.path)?;

        debug!(
            "Parsed testbed '{}' from {} ({} devices)",
            snapshot.name,
            self.path.display(),
            snapshot.devices.len()
        );
        Ok(snapshot)
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Deserialize)]
struct TestbedFile {
    #[serde(default)]
    testbed: TestbedHeader,

    #[serde(default)]
    devices: IndexMap<String, DeviceSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct TestbedHeader {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    credentials: IndexMap<String, Credential>,
}

/// Parse testbed YAML into a snapshot.
///
/// Credential sets defined at testbed level fill in any set a device does
/// not define itself. Text with nothing but blank lines and comments is
/// rejected.
pub(crate) fn parse_testbed(text: &str, path: &Path) -> Result<TopologySnapshot, TopologyError> {
    let blank = text
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank {
        return Err(TopologyError::Empty {
            path: path.to_path_buf(),
        });
    }

    let file: TestbedFile =
        serde_yaml::from_str(text).map_err(|source| TopologyError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    let shared = file.testbed.credentials;
    let devices = file
        .devices
        .into_iter()
        .map(|(name, mut spec)| {
            spec.name = name.clone();
            for (set, credential) in &shared {
                spec.credentials
                    .entry(set.clone())
                    .or_insert_with(|| credential.clone());
            }
            (name, Arc::new(spec))
        })
        .collect();

    Ok(TopologySnapshot {
        name: file.testbed.name.unwrap_or_else(|| fallback_name(path)),
        devices,
    })
}

/// File stem of the descriptor, used when the testbed has no name.
fn fallback_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "testbed".to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    const TESTBED: &str = r#"
testbed:
  name: lab
  credentials:
    default:
      username: admin
      password: cisco123
devices:
  R1:
    os: iosxe
    platform: cat8k
    type: router
    connections:
      defaults:
        class: unicon.Unicon
      cli:
        protocol: ssh
        ip: 10.0.0.1
        port: 22
  srv1:
    os: linux
    type: server
    credentials:
      default:
        username: root
    connections:
      ssh:
        host: srv1.lab.local
"#;

    #[test]
    fn test_parse_testbed() {
        let snapshot = parse_testbed(TESTBED, Path::new("fallback.yaml")).unwrap();
        assert_eq!(snapshot.name, "lab");
        assert_eq!(
            snapshot.devices.keys().collect::<Vec<_>>(),
            vec!["R1", "srv1"]
        );

        let r1 = snapshot.device("R1").unwrap();
        assert_eq!(r1.name, "R1");
        assert_eq!(r1.os_name(), "iosxe");
        let (conn_name, conn) = r1.cli_connection().unwrap();
        assert_eq!(conn_name, "cli");
        assert_eq!(conn.address(), Some("10.0.0.1"));
        assert_eq!(conn.port, Some(22));

        let cred = r1.credential("default").unwrap();
        assert_eq!(cred.username.as_deref(), Some("admin"));
        assert_eq!(cred.password.as_ref().unwrap().expose_secret(), "cisco123");
    }

    #[test]
    fn test_device_credentials_take_precedence() {
        let snapshot = parse_testbed(TESTBED, Path::new("fallback.yaml")).unwrap();
        let srv = snapshot.device("srv1").unwrap();
        let cred = srv.credential("default").unwrap();
        assert_eq!(cred.username.as_deref(), Some("root"));
        assert!(cred.password.is_none());

        let (conn_name, conn) = srv.cli_connection().unwrap();
        assert_eq!(conn_name, "ssh");
        assert_eq!(conn.address(), Some("srv1.lab.local"));
        assert_eq!(conn.protocol(), "ssh");
    }

    #[test]
    fn test_summary_lists_connections() {
        let snapshot = parse_testbed(TESTBED, Path::new("fallback.yaml")).unwrap();
        let summary = snapshot.summary();
        let r1 = &summary["R1"];
        assert_eq!(r1.os.as_deref(), Some("iosxe"));
        assert_eq!(r1.device_type.as_deref(), Some("router"));
        assert_eq!(r1.connections, vec!["defaults", "cli"]);
    }

    #[test]
    fn test_fallback_name() {
        let snapshot = parse_testbed("devices: {}\n", Path::new("labs/mylab.yaml")).unwrap();
        assert_eq!(snapshot.name, "mylab");
        assert!(snapshot.devices.is_empty());
    }

    #[test]
    fn test_blank_file_is_rejected() {
        for text in ["", "  \n\n", "# nothing here yet\n"] {
            let err = parse_testbed(text, Path::new("empty.yaml")).unwrap_err();
            assert!(matches!(err, TopologyError::Empty { .. }), "{text:?}");
            assert_eq!(
                crate::Error::from(err).kind(),
                crate::error::ErrorKind::Load
            );
        }
    }

    #[test]
    fn test_malformed_yaml() {
        let path = Path::new("bad.yaml");
        assert!(matches!(
            parse_testbed("devices: [unclosed", path),
            Err(TopologyError::Malformed { .. })
        ));
        assert!(parse_testbed("devices:\n  R1: 42\n", path).is_err());
    }

    #[tokio::test]
    async fn test_yaml_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TESTBED.as_bytes()).unwrap();

        let loader = YamlTopologyLoader::new(file.path());
        let snapshot = loader.load().await.unwrap();
        assert_eq!(snapshot.devices.len(), 2);
        assert_eq!(loader.source(), file.path().display().to_string());
    }

    #[tokio::test]
    async fn test_yaml_loader_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let loader = YamlTopologyLoader::new(file.path());
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, TopologyError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_yaml_loader_missing_file() {
        let loader = YamlTopologyLoader::new("/nonexistent/testbed.yaml");
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, TopologyError::Read { .. }));
    }
}
