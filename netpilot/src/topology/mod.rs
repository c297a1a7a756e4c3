//! Testbed topology: the inventory of known devices.
//!
//! A [`TopologySnapshot`] is immutable once loaded. The [`TopologyCache`]
//! swaps whole snapshots when its TTL runs out; nothing edits one in place.

mod cache;
mod loader;

pub use cache::TopologyCache;
pub use loader::{TopologyLoader, YamlTopologyLoader};

pub(crate) use loader::parse_testbed;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Name of the credential set used when a device does not ask for another.
pub const DEFAULT_CREDENTIAL: &str = "default";

/// One loaded testbed.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    /// Testbed name from the descriptor (falls back to the file stem).
    pub name: String,

    /// Devices keyed by name, in descriptor order.
    pub devices: IndexMap<String, Arc<DeviceSpec>>,
}

impl TopologySnapshot {
    /// Look up a device by name.
    pub fn device(&self, name: &str) -> Option<&Arc<DeviceSpec>> {
        self.devices.get(name)
    }

    /// Per-device summary as exposed by the inventory listing.
    pub fn summary(&self) -> IndexMap<String, DeviceSummary> {
        self.devices
            .iter()
            .map(|(name, spec)| (name.clone(), DeviceSummary::from(spec.as_ref())))
            .collect()
    }
}

/// A device entry from the testbed.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
    /// Device name (the key it is listed under).
    #[serde(skip)]
    pub name: String,

    /// Operating system, e.g. `iosxe`, `nxos`, `junos`, `linux`.
    #[serde(default)]
    pub os: Option<String>,

    /// Hardware platform, e.g. `cat9k`.
    #[serde(default)]
    pub platform: Option<String>,

    /// Device role, e.g. `router`, `switch`.
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,

    /// Named credential sets.
    #[serde(default)]
    pub credentials: IndexMap<String, Credential>,

    /// Named connection endpoints.
    #[serde(default)]
    pub connections: IndexMap<String, ConnectionSpec>,
}

impl DeviceSpec {
    /// Operating system name, lower-cased, or `generic` when unset.
    pub fn os_name(&self) -> String {
        self.os
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "generic".to_string())
    }

    /// The endpoint to open a CLI session on.
    ///
    /// Prefers a connection named `cli`, then the first one with an address.
    pub fn cli_connection(&self) -> Option<(&str, &ConnectionSpec)> {
        if let Some(conn) = self.connections.get("cli").filter(|c| c.address().is_some()) {
            return Some(("cli", conn));
        }
        self.connections
            .iter()
            .find(|(_, conn)| conn.address().is_some())
            .map(|(name, conn)| (name.as_str(), conn))
    }

    /// Credential set by name.
    pub fn credential(&self, name: &str) -> Option<&Credential> {
        self.credentials.get(name)
    }
}

/// Username/password pair. The password never shows up in `Debug` output.
#[derive(Debug, Deserialize, Default)]
pub struct Credential {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<SecretString>,
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: self
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_owned())),
        }
    }
}

/// A connection endpoint from the testbed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSpec {
    /// Transport protocol; `ssh` when unset.
    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,
}

impl ConnectionSpec {
    /// Address to connect to (`ip` wins over `host`).
    pub fn address(&self) -> Option<&str> {
        self.ip.as_deref().or(self.host.as_deref())
    }

    pub fn protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or("ssh")
    }
}

/// Inventory view of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub os: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub platform: Option<String>,
    pub connections: Vec<String>,
}

impl From<&DeviceSpec> for DeviceSummary {
    fn from(spec: &DeviceSpec) -> Self {
        Self {
            os: spec.os.clone(),
            device_type: spec.device_type.clone(),
            platform: spec.platform.clone(),
            connections: spec.connections.keys().cloned().collect(),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.os_name())
    }
}
