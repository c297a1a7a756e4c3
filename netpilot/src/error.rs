//! Error types for netpilot.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for netpilot operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input (show command, config payload, test script)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The requested device is not part of the testbed
    #[error("Device '{name}' not found in testbed '{testbed}'")]
    DeviceNotFound { name: String, testbed: String },

    /// Testbed loading errors
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Device session errors (connect, execute, configure)
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Script runner errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Classify the error for callers that need to tell failures apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::DeviceNotFound { .. } => ErrorKind::NotFound,
            Error::Topology(_) | Error::Config(_) => ErrorKind::Load,
            Error::Device(e) => e.kind(),
            Error::Script(e) => e.kind(),
        }
    }
}

/// Coarse error classification carried by every error outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; never retried.
    Validation,
    /// Unknown device name.
    NotFound,
    /// Device unreachable or login failed.
    Connection,
    /// Command, configuration or subprocess failed.
    Execution,
    /// An operation exceeded its time bound.
    Timeout,
    /// Testbed or settings could not be loaded.
    Load,
}

/// Input rejected before it reaches a device or a subprocess.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Command '{command}' is not a 'show' command.")]
    NotShowCommand { command: String },

    #[error("Command '{command}' contains disallowed pipe/redirection.")]
    PipeOrRedirect { command: String },

    #[error("Command '{command}' contains disallowed term '{term}'.")]
    DisallowedTerm { command: String, term: String },

    #[error("No valid configuration lines provided.")]
    EmptyConfig,

    #[error("Empty test script content provided.")]
    EmptyScript,

    #[error("Script contains banned import: {module}")]
    BannedImport { module: String },

    #[error("Script contains banned pattern: {pattern}")]
    BannedPattern { pattern: String },
}

/// Testbed loading errors.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// The descriptor could not be read
    #[error("Failed to read testbed '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The descriptor is not valid testbed YAML
    #[error("Malformed testbed '{}': {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The descriptor has no content
    #[error("Testbed '{}' is empty", path.display())]
    Empty { path: PathBuf },
}

/// Device session errors.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Could not establish the session
    #[error("Failed to connect to {device}: {message}")]
    ConnectFailed { device: String, message: String },

    /// Operation attempted on a closed session
    #[error("Device not connected")]
    NotConnected,

    /// The session dropped while an operation was in flight
    #[error("Connection to device lost")]
    Disconnected,

    /// The device answered with a known failure marker
    #[error("Command '{command}' rejected by device: {marker}")]
    CommandRejected { command: String, marker: String },

    /// Generic command failure
    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    /// The device did not answer within the bound
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// No usable connection or credentials in the testbed entry
    #[error("Invalid device definition for {device}: {message}")]
    InvalidDefinition { device: String, message: String },

    /// SSH transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DeviceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::ConnectFailed { .. } | DeviceError::InvalidDefinition { .. } => {
                ErrorKind::Connection
            }
            DeviceError::Timeout(_) => ErrorKind::Timeout,
            DeviceError::Transport(e) => e.kind(),
            _ => ErrorKind::Execution,
        }
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server key not recorded and strict checking is on
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Disconnected => ErrorKind::Execution,
            _ => ErrorKind::Connection,
        }
    }
}

/// Script runner errors.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script was refused before anything ran
    #[error("{0}")]
    Rejected(#[from] ValidationError),

    /// Artifact directory or file I/O failed
    #[error("Artifact I/O failed for '{}': {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The test binary could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        artifacts_dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The test binary exceeded its time bound and was killed
    #[error("Test job timed out after {}s", after.as_secs())]
    Timeout {
        after: Duration,
        artifacts_dir: PathBuf,
    },
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Rejected(_) => ErrorKind::Validation,
            ScriptError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Execution,
        }
    }

    /// Run directory left behind by the failed run, if one was created.
    pub fn artifacts_dir(&self) -> Option<&Path> {
        match self {
            ScriptError::Spawn { artifacts_dir, .. }
            | ScriptError::Timeout { artifacts_dir, .. } => Some(artifacts_dir.as_path()),
            _ => None,
        }
    }
}

/// Structured parse failures. These never reach callers: the pipeline
/// falls back to raw output.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The template could not be read or compiled
    #[error("Invalid template '{}': {message}", path.display())]
    Template { path: PathBuf, message: String },

    /// The parser rejected the output
    #[error("Parser '{parser}' failed: {message}")]
    Failed { parser: String, message: String },

    /// The parser matched nothing
    #[error("Parser '{parser}' produced no records")]
    Empty { parser: String },
}

/// Settings errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{name} is not set")]
    Missing { name: &'static str },

    /// A variable holds an unusable value
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The testbed file does not exist
    #[error("Testbed file not found: {}", .0.display())]
    TestbedNotFound(PathBuf),
}

/// Result type alias using netpilot's Error.
pub type Result<T> = std::result::Result<T, Error>;
