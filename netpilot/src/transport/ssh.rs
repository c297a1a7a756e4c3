//! SSH transport implementation using russh.
//!
//! One [`SshTransport`] is one authenticated connection with a single
//! interactive PTY shell on top of it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use regex::bytes::Regex;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::channel::PatternBuffer;
use crate::error::TransportError;

/// SSH session with an interactive shell channel.
pub struct SshTransport {
    session: Handle<SshHandler>,
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    log_transcript: bool,
}

impl SshTransport {
    /// Connect, authenticate and open the shell, all within `config.timeout`.
    pub async fn connect(config: &SshConfig) -> Result<Self, TransportError> {
        tokio::time::timeout(config.timeout, Self::establish(config))
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))?
    }

    async fn establish(config: &SshConfig) -> Result<Self, TransportError> {
        // Cached sessions sit idle between operations; keepalives hold them
        // open instead of an inactivity timeout.
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = client::connect(ssh_config, (config.host.as_str(), config.port), handler)
            .await
            .map_err(|e| {
                // Prefer the detailed host-key error over russh's UnknownKey
                host_key_error
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take()
                    .unwrap_or(TransportError::Ssh(e))
            })?;

        Self::authenticate(&mut session, config).await?;

        let channel = session.channel_open_session().await?;
        channel
            .request_pty(
                true,
                "xterm",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;

        debug!("Shell open on {}", config.socket_addr());

        Ok(Self {
            session,
            channel,
            buffer: PatternBuffer::default(),
            log_transcript: config.log_transcript,
        })
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SshConfig,
    ) -> Result<(), TransportError> {
        let success = match &config.auth {
            AuthMethod::None => session.authenticate_none(&config.username).await?.success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                let hash_alg = session.best_supported_rsa_hash().await?.flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            });
        }
        Ok(())
    }

    /// Send one line (a newline is appended).
    ///
    /// Anything still buffered from earlier output is discarded first.
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.buffer.clear();
        let data = format!("{line}\n");
        self.channel.data(data.as_bytes()).await?;
        Ok(())
    }

    /// Read until `prompt` matches the tail of the buffer, answering any
    /// pager marker with a space on the way.
    ///
    /// Returns everything read, with escape sequences already stripped.
    pub async fn read_until_prompt(
        &mut self,
        prompt: &Regex,
        pager: Option<&Regex>,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(range) = pager.and_then(|p| self.buffer.search_tail(p)) {
                trace!("Pager prompt, requesting next page");
                self.buffer.remove(range);
                self.channel.data(&b" "[..]).await?;
                continue;
            }

            if self.buffer.tail_contains(prompt) {
                let data = self.buffer.take();
                return Ok(String::from_utf8_lossy(&data).into_owned());
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| TransportError::Timeout(timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    if self.log_transcript {
                        trace!("<< {:?}", String::from_utf8_lossy(&data));
                    }
                    self.buffer.extend(&data);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }
    }

    /// Whether the underlying SSH session is still open.
    pub fn is_alive(&self) -> bool {
        !self.session.is_closed()
    }

    /// Close the connection.
    pub async fn close(self) -> Result<(), TransportError> {
        let _ = self.channel.eof().await;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// `Ok(true)` when known and matching, `Ok(false)` when unknown.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => russh::keys::known_hosts::learn_known_hosts_path(
                &self.host, self.port, pubkey, path,
            ),
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };
        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(error);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,
            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },
            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
