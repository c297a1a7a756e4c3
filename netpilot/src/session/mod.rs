//! Device sessions: the client capability trait and the session cache.

mod cache;
mod ssh;

pub use cache::SessionCache;
pub use ssh::{SshDevice, SshDeviceFactory};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::DeviceError;
use crate::topology::DeviceSpec;

/// A connectable device capable of running CLI commands.
#[async_trait]
pub trait DeviceClient: Send {
    /// Open the session. A no-op when already connected.
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), DeviceError>;

    /// Whether the session is currently usable.
    fn is_connected(&self) -> bool;

    /// Run one command and return its raw output.
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String, DeviceError>;

    /// Enter configuration mode, send `lines` in order, leave it again.
    async fn configure(&mut self, lines: &[String], timeout: Duration)
        -> Result<String, DeviceError>;

    /// Close the session.
    async fn disconnect(&mut self) -> Result<(), DeviceError>;
}

/// Builds an unconnected client for a testbed device.
pub trait DeviceFactory: Send + Sync {
    fn create(&self, name: &str, spec: &DeviceSpec) -> Result<Box<dyn DeviceClient>, DeviceError>;
}

/// Parameters for opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on establishing the session.
    pub timeout: Duration,

    /// Learn the device hostname from its prompt.
    pub learn_hostname: bool,

    /// Log the raw session transcript.
    pub log_transcript: bool,

    /// Skip the platform's session setup commands.
    pub skip_init_commands: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            learn_hostname: true,
            log_transcript: false,
            skip_init_commands: true,
        }
    }
}

/// A device client checked out of the [`SessionCache`].
///
/// Clones share the same client; its lock serializes operations on one
/// session.
#[derive(Clone)]
pub struct SessionHandle {
    name: String,
    spec: Arc<DeviceSpec>,
    client: Arc<Mutex<Box<dyn DeviceClient>>>,
}

impl SessionHandle {
    pub(crate) fn new(name: &str, spec: Arc<DeviceSpec>, client: Box<dyn DeviceClient>) -> Self {
        Self {
            name: name.to_string(),
            spec,
            client: Arc::new(Mutex::new(client)),
        }
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Testbed entry the session was opened from.
    pub fn spec(&self) -> &Arc<DeviceSpec> {
        &self.spec
    }

    /// Exclusive access to the client for one operation.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Box<dyn DeviceClient>> {
        self.client.lock().await
    }

    /// The client, unless an operation currently holds it.
    pub fn try_lock(&self) -> Option<tokio::sync::MutexGuard<'_, Box<dyn DeviceClient>>> {
        self.client.try_lock().ok()
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
