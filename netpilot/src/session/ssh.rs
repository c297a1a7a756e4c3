//! SSH-backed [`DeviceClient`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use super::{ConnectOptions, DeviceClient, DeviceFactory};
use crate::error::{DeviceError, TransportError};
use crate::platform::{PlatformProfile, hostname_from_prompt};
use crate::topology::{DEFAULT_CREDENTIAL, DeviceSpec};
use crate::transport::{AuthMethod, HostKeyVerification, SshConfig, SshTransport};

/// Interactive CLI session over SSH.
pub struct SshDevice {
    name: String,
    config: SshConfig,
    profile: PlatformProfile,
    transport: Option<SshTransport>,
    hostname: Option<String>,
}

impl SshDevice {
    pub fn new(name: impl Into<String>, config: SshConfig, profile: PlatformProfile) -> Self {
        Self {
            name: name.into(),
            config,
            profile,
            transport: None,
            hostname: None,
        }
    }

    /// Hostname learned from the prompt at connect time.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Send one line and read up to the next prompt, returning the raw text.
    async fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String, DeviceError> {
        let prompt = &self.profile.prompt;
        let pager = self.profile.pager.as_ref();
        let transport = self.transport.as_mut().ok_or(DeviceError::NotConnected)?;

        let result = match transport.send_line(command).await {
            Ok(()) => transport.read_until_prompt(prompt, pager, timeout).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(raw) => Ok(raw),
            Err(TransportError::Disconnected) => {
                warn!("Session to {} closed by peer", self.name);
                self.transport = None;
                Err(DeviceError::Disconnected)
            }
            Err(TransportError::Timeout(after)) => Err(DeviceError::Timeout(after)),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`exchange`](Self::exchange), minus the echo and the prompt.
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, DeviceError> {
        let raw = self.exchange(command, timeout).await?;
        Ok(trim_response(command, &raw, &self.profile.prompt))
    }

    async fn run_config(
        &mut self,
        lines: &[String],
        timeout: Duration,
    ) -> Result<String, DeviceError> {
        let mut transcript = Vec::new();

        for command in self.profile.config_enter.clone() {
            transcript.push(self.run(&command, timeout).await?);
        }

        for line in lines {
            let output = self.run(line, timeout).await?;
            let rejected = self.profile.detect_failure(&output).map(str::to_string);
            transcript.push(output);

            if let Some(marker) = rejected {
                self.abort_config(timeout).await;
                return Err(DeviceError::CommandRejected {
                    command: line.clone(),
                    marker,
                });
            }
        }

        for command in self.profile.config_exit.clone() {
            let output = self.run(&command, timeout).await?;
            if let Some(marker) = self.profile.detect_failure(&output) {
                return Err(DeviceError::CommandRejected {
                    command,
                    marker: marker.to_string(),
                });
            }
            transcript.push(output);
        }

        Ok(transcript.join("\n"))
    }

    async fn abort_config(&mut self, timeout: Duration) {
        for command in self.profile.config_abort.clone() {
            if let Err(e) = self.run(&command, timeout).await {
                warn!("Failed to leave configuration mode on {}: {}", self.name, e);
                return;
            }
        }
    }
}

#[async_trait]
impl DeviceClient for SshDevice {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), DeviceError> {
        if self.is_connected() {
            return Ok(());
        }

        self.config.timeout = options.timeout;
        self.config.log_transcript = options.log_transcript;
        self.config.terminal_width = self.profile.terminal_width;
        self.config.terminal_height = self.profile.terminal_height;

        let transport = SshTransport::connect(&self.config)
            .await
            .map_err(|e| connect_error(&self.name, e))?;
        self.transport = Some(transport);

        // Wake the shell and wait for the first prompt.
        let banner = self.exchange("", options.timeout).await?;
        if options.learn_hostname {
            self.hostname = hostname_from_prompt(&banner);
            if let Some(hostname) = &self.hostname {
                debug!("Learned hostname '{}' for {}", hostname, self.name);
            }
        }

        if !options.skip_init_commands {
            for command in self.profile.on_open_commands.clone() {
                self.run(&command, options.timeout).await?;
            }
        }

        info!(
            "Session open to {} ({}) using profile {}",
            self.name,
            self.config.socket_addr(),
            self.profile.name
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(SshTransport::is_alive)
    }

    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<String, DeviceError> {
        let output = self.run(command, timeout).await?;
        if let Some(marker) = self.profile.detect_failure(&output) {
            return Err(DeviceError::CommandRejected {
                command: command.to_string(),
                marker: marker.to_string(),
            });
        }
        Ok(output)
    }

    async fn configure(
        &mut self,
        lines: &[String],
        timeout: Duration,
    ) -> Result<String, DeviceError> {
        if !self.profile.supports_config() {
            return Err(DeviceError::CommandFailed {
                message: format!("platform '{}' has no configuration mode", self.profile.name),
            });
        }
        if self.transport.is_none() {
            return Err(DeviceError::NotConnected);
        }

        tokio::time::timeout(timeout, self.run_config(lines, timeout))
            .await
            .map_err(|_| DeviceError::Timeout(timeout))?
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }
}

/// Drop the echoed command line and the trailing prompt.
fn trim_response(command: &str, raw: &str, prompt: &Regex) -> String {
    let mut lines: Vec<&str> = raw.lines().map(|l| l.trim_end_matches('\r')).collect();

    let command = command.trim();
    if !command.is_empty() && lines.first().is_some_and(|l| l.trim_end().ends_with(command)) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| prompt.is_match(l.as_bytes())) {
        lines.pop();
    }
    lines.join("\n")
}

/// Creates [`SshDevice`] clients from testbed entries.
///
/// The device's `cli` connection (or first connection with an address) and
/// its `default` credential set are used. Devices without a password fall
/// back to the configured private key.
#[derive(Debug, Clone, Default)]
pub struct SshDeviceFactory {
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    private_key: Option<PathBuf>,
}

impl SshDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Build the SSH configuration for one device.
    pub(crate) fn ssh_config(
        &self,
        name: &str,
        spec: &DeviceSpec,
    ) -> Result<SshConfig, DeviceError> {
        let invalid = |message: String| DeviceError::InvalidDefinition {
            device: name.to_string(),
            message,
        };

        let (conn_name, conn) = spec
            .cli_connection()
            .ok_or_else(|| invalid("no connection with an ip or host".into()))?;
        if conn.protocol() != "ssh" {
            return Err(invalid(format!(
                "connection '{}' uses unsupported protocol '{}'",
                conn_name,
                conn.protocol()
            )));
        }
        let address = conn
            .address()
            .ok_or_else(|| invalid(format!("connection '{conn_name}' has no address")))?;

        let credential = spec
            .credential(DEFAULT_CREDENTIAL)
            .or_else(|| spec.credentials.values().next());
        let username = credential
            .and_then(|c| c.username.clone())
            .ok_or_else(|| invalid("no username in credentials".into()))?;

        let auth = match (credential.and_then(|c| c.password.as_ref()), &self.private_key) {
            (Some(password), _) => {
                AuthMethod::Password(SecretString::from(password.expose_secret().to_owned()))
            }
            (None, Some(path)) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: None,
            },
            (None, None) => AuthMethod::None,
        };

        let mut config = SshConfig::new(address, username, auth);
        config.port = conn.port.unwrap_or(22);
        config.host_key_verification = self.host_key_verification.clone();
        config.known_hosts_path = self.known_hosts_path.clone();
        Ok(config)
    }
}

impl DeviceFactory for SshDeviceFactory {
    fn create(&self, name: &str, spec: &DeviceSpec) -> Result<Box<dyn DeviceClient>, DeviceError> {
        let config = self.ssh_config(name, spec)?;
        let profile = PlatformProfile::for_os(&spec.os_name());
        debug!("Using profile {} for {}", profile.name, name);
        Ok(Box::new(SshDevice::new(name, config, profile)))
    }
}

/// A connect that ran out of time stays a timeout; anything else is a
/// failed connect.
fn connect_error(device: &str, err: TransportError) -> DeviceError {
    match err {
        TransportError::Timeout(after) => DeviceError::Timeout(after),
        e => DeviceError::ConnectFailed {
            device: device.to_string(),
            message: e.to_string(),
        },
    }
}
