//! Command execution pipeline and its result values.

mod pipeline;

pub use pipeline::CommandPipeline;

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ErrorKind};
use crate::topology::DeviceSummary;

/// Device operations offered by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Show,
    Configure,
    LearnConfig,
    LearnLogging,
    Ping,
    LinuxCommand,
}

impl Operation {
    /// Device-side time bound.
    pub fn timeout(self) -> Duration {
        let secs = match self {
            Operation::Show => 60,
            Operation::Configure | Operation::Ping => 180,
            Operation::LearnConfig | Operation::LearnLogging | Operation::LinuxCommand => 120,
        };
        Duration::from_secs(secs)
    }

    /// Whether structured parsing is attempted on the output.
    pub fn parses_output(self) -> bool {
        matches!(self, Operation::Show | Operation::Ping)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Show => "show",
            Operation::Configure => "configure",
            Operation::LearnConfig => "learn_config",
            Operation::LearnLogging => "learn_logging",
            Operation::Ping => "ping",
            Operation::LinuxCommand => "linux_command",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one device operation. Serialized with a `status` tag of
/// `completed` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Completed {
        device: String,
        operation: Operation,
        #[serde(skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lines_sent: Option<Vec<String>>,
        /// Cleaned device output.
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parsed_output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parser_used: Option<String>,
    },
    Error {
        device: String,
        operation: Operation,
        #[serde(skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lines_sent: Option<Vec<String>>,
        error: String,
        kind: ErrorKind,
    },
}

impl ExecutionOutcome {
    pub(crate) fn failure(
        device: &str,
        operation: Operation,
        command: Option<String>,
        lines_sent: Option<Vec<String>>,
        error: &Error,
    ) -> Self {
        ExecutionOutcome::Error {
            device: device.to_string(),
            operation,
            command,
            lines_sent,
            error: error.to_string(),
            kind: error.kind(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }

    pub fn device(&self) -> &str {
        match self {
            ExecutionOutcome::Completed { device, .. } | ExecutionOutcome::Error { device, .. } => {
                device
            }
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            ExecutionOutcome::Completed { operation, .. }
            | ExecutionOutcome::Error { operation, .. } => *operation,
        }
    }

    /// Cleaned output of a completed operation.
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Completed { output, .. } => Some(output),
            ExecutionOutcome::Error { .. } => None,
        }
    }

    /// Error text of a failed operation.
    pub fn error(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Error { error, .. } => Some(error),
            ExecutionOutcome::Completed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExecutionOutcome::Error { kind, .. } => Some(*kind),
            ExecutionOutcome::Completed { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Result of listing the testbed inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InventoryOutcome {
    Completed {
        testbed: String,
        devices: IndexMap<String, DeviceSummary>,
    },
    Error {
        error: String,
        kind: ErrorKind,
    },
}

impl InventoryOutcome {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
