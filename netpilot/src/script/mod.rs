//! Sandboxed execution of user-supplied test scripts.

mod gate;
mod process;
mod runner;

pub use gate::{BANNED_IMPORTS, BANNED_PATTERNS, check_script};
pub use process::{ProcessOutput, ProcessSpawner, ProcessSpec, TokioProcessSpawner};
pub use runner::{DEFAULT_SCRIPT_TIMEOUT, RunPaths, RunReport, ScriptRunner, Verdict};

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ScriptError};

/// Result of a script run, serialized with a `status` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScriptOutcome {
    Completed(RunReport),
    Error {
        error: String,
        kind: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifacts_dir: Option<PathBuf>,
    },
}

impl ScriptOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ScriptOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            ScriptOutcome::Completed(report) => Some(report),
            ScriptOutcome::Error { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Result<RunReport, ScriptError>> for ScriptOutcome {
    fn from(result: Result<RunReport, ScriptError>) -> Self {
        match result {
            Ok(report) => ScriptOutcome::Completed(report),
            Err(e) => ScriptOutcome::Error {
                error: e.to_string(),
                kind: e.kind(),
                artifacts_dir: e.artifacts_dir().map(PathBuf::from),
            },
        }
    }
}
