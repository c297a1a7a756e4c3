//! acquire → validate → execute → clean → parse → release.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};

use super::{ExecutionOutcome, Operation};
use crate::channel::clean_output;
use crate::command::{ConfigPayload, normalize_config, validate_show_command};
use crate::error::{DeviceError, Error, ValidationError};
use crate::parser::ParserRegistry;
use crate::session::{SessionCache, SessionHandle};

/// Runs device operations against sessions from a [`SessionCache`].
///
/// Every operation runs in its own task: dropping the returned future does
/// not abandon a session halfway through a command. Failures are returned
/// as [`ExecutionOutcome::Error`], never as `Err`.
#[derive(Clone)]
pub struct CommandPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Arc<SessionCache>,
    parsers: Arc<dyn ParserRegistry>,
    timeout: Option<Duration>,
}

enum Request {
    Command(String),
    Config(Vec<String>),
}

impl Request {
    fn command(&self) -> Option<String> {
        match self {
            Request::Command(command) => Some(command.clone()),
            Request::Config(_) => None,
        }
    }

    fn lines(&self) -> Option<Vec<String>> {
        match self {
            Request::Config(lines) => Some(lines.clone()),
            Request::Command(_) => None,
        }
    }
}

impl CommandPipeline {
    pub fn new(sessions: Arc<SessionCache>, parsers: Arc<dyn ParserRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                parsers,
                timeout: None,
            }),
        }
    }

    /// Bound every operation by `timeout` instead of its own default.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: self.inner.sessions.clone(),
                parsers: self.inner.parsers.clone(),
                timeout: Some(timeout),
            }),
        }
    }

    /// Run a read-only `show` command, with structured parsing when a
    /// parser is available.
    pub async fn show(&self, device: &str, command: &str) -> ExecutionOutcome {
        let command = command.trim();
        if let Err(e) = validate_show_command(command) {
            return reject(device, Operation::Show, Some(command.to_string()), None, e);
        }
        self.dispatch(device, Operation::Show, Request::Command(command.to_string()))
            .await
    }

    /// Push configuration lines in configuration mode.
    pub async fn configure(&self, device: &str, payload: &ConfigPayload) -> ExecutionOutcome {
        let lines = normalize_config(payload);
        if lines.is_empty() {
            return reject(device, Operation::Configure, None, None, ValidationError::EmptyConfig);
        }
        self.dispatch(device, Operation::Configure, Request::Config(lines))
            .await
    }

    /// Fetch the running configuration.
    pub async fn learn_config(&self, device: &str) -> ExecutionOutcome {
        self.dispatch(
            device,
            Operation::LearnConfig,
            Request::Command("show running-config".to_string()),
        )
        .await
    }

    /// Fetch the device log buffer.
    pub async fn learn_logging(&self, device: &str) -> ExecutionOutcome {
        self.dispatch(
            device,
            Operation::LearnLogging,
            Request::Command("show logging".to_string()),
        )
        .await
    }

    /// Run a ping from the device.
    pub async fn ping(&self, device: &str, command: &str) -> ExecutionOutcome {
        self.dispatch(device, Operation::Ping, Request::Command(command.to_string()))
            .await
    }

    /// Run a shell command on a Linux host.
    pub async fn linux_command(&self, device: &str, command: &str) -> ExecutionOutcome {
        self.dispatch(
            device,
            Operation::LinuxCommand,
            Request::Command(command.to_string()),
        )
        .await
    }

    async fn dispatch(
        &self,
        device: &str,
        operation: Operation,
        request: Request,
    ) -> ExecutionOutcome {
        let command = request.command();
        let lines = request.lines();

        let inner = self.inner.clone();
        let name = device.to_string();
        let task = tokio::spawn(async move { inner.run(&name, operation, request).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{} task for {} did not complete: {}", operation, device, e);
                let err = Error::from(DeviceError::CommandFailed {
                    message: format!("operation task failed: {e}"),
                });
                ExecutionOutcome::failure(device, operation, command, lines, &err)
            }
        }
    }
}

impl Inner {
    async fn run(&self, device: &str, operation: Operation, request: Request) -> ExecutionOutcome {
        let handle = match self.sessions.acquire(device).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("{} on {}: {}", operation, device, e);
                return ExecutionOutcome::failure(
                    device,
                    operation,
                    request.command(),
                    request.lines(),
                    &e,
                );
            }
        };

        match self.execute(&handle, operation, &request).await {
            Ok(raw) => {
                let output = clean_output(&raw);
                let (parsed_output, parser_used) = match &request {
                    Request::Command(command) if operation.parses_output() => {
                        self.try_parse(command, &handle, &output)
                    }
                    _ => (None, None),
                };
                self.sessions.release(&handle, false).await;

                ExecutionOutcome::Completed {
                    device: device.to_string(),
                    operation,
                    command: request.command(),
                    lines_sent: request.lines(),
                    output,
                    parsed_output,
                    parser_used,
                }
            }
            Err(e) => {
                error!("{} on {} failed: {}", operation, device, e);
                self.sessions.release(&handle, true).await;
                let err = Error::from(e);
                ExecutionOutcome::failure(
                    device,
                    operation,
                    request.command(),
                    request.lines(),
                    &err,
                )
            }
        }
    }

    /// Run the request under the session lock and the operation's bound.
    /// The lock is released before returning.
    async fn execute(
        &self,
        handle: &SessionHandle,
        operation: Operation,
        request: &Request,
    ) -> Result<String, DeviceError> {
        let timeout = self.timeout.unwrap_or_else(|| operation.timeout());
        let mut client = handle.lock().await;

        let work = async {
            match request {
                Request::Command(command) => client.execute(command, timeout).await,
                Request::Config(lines) => client.configure(lines, timeout).await,
            }
        };

        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| DeviceError::Timeout(timeout))?
    }

    fn try_parse(
        &self,
        command: &str,
        handle: &SessionHandle,
        output: &str,
    ) -> (Option<serde_json::Value>, Option<String>) {
        let Some(parser) = self.parsers.get_parser(command, handle.spec()) else {
            debug!("No parser for '{}' on {}", command, handle.name());
            return (None, None);
        };

        match parser.parse(output) {
            Ok(parsed) => (Some(parsed), Some(parser.name().to_string())),
            Err(e) => {
                warn!("Parser failed for '{}' on {}: {}", command, handle.name(), e);
                (None, None)
            }
        }
    }
}

fn reject(
    device: &str,
    operation: Operation,
    command: Option<String>,
    lines: Option<Vec<String>>,
    error: ValidationError,
) -> ExecutionOutcome {
    warn!("Rejected {} request for {}: {}", operation, device, error);
    ExecutionOutcome::failure(device, operation, command, lines, &Error::from(error))
}
