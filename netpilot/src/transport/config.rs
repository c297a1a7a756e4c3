//! Per-device SSH parameters, built from a testbed entry.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// What to do with the server's host key, like OpenSSH's
/// `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Learn unknown keys, reject changed ones.
    #[default]
    AcceptNew,

    /// Accept every key. Lab use only.
    Disabled,
}

/// Everything needed to open one device session.
#[derive(Debug)]
pub struct SshConfig {
    /// Address from the testbed connection (`ip`, else `host`).
    pub host: String,

    /// Connection port; 22 unless the testbed says otherwise.
    pub port: u16,

    /// Login user from the device credentials.
    pub username: String,

    pub auth: AuthMethod,

    /// Bound on TCP connect, handshake, authentication and shell setup.
    pub timeout: Duration,

    /// PTY size, taken from the platform profile.
    pub terminal_width: u32,
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file; the user's default file when unset.
    pub known_hosts_path: Option<PathBuf>,

    /// Log every byte received at trace level.
    pub log_transcript: bool,
}

impl SshConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            log_transcript: false,
        }
    }

    /// `host:port`, for log lines.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How the session authenticates.
#[derive(Debug)]
pub enum AuthMethod {
    /// `none` auth; lab hosts only.
    None,

    /// Password from the testbed credentials.
    Password(SecretString),

    /// Key file, used when the device has no password.
    PrivateKey {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
}
