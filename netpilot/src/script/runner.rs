//! Writes a script and its job file into a fresh run directory, runs the
//! test binary on it and collects the JSON report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use super::gate::check_script;
use super::process::{ProcessSpawner, ProcessSpec};
use crate::error::ScriptError;

/// Bound on one test job.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

const SCRIPT_FILE: &str = "test_script.py";
const JOB_FILE: &str = "job.py";
const REPORT_FILE: &str = "report.json";
const TESTBED_ENV: &str = "PYATS_TESTBED_PATH";

/// Overall result scraped from the job's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Passed,
    Failed,
    Unknown,
}

impl Verdict {
    /// The first line mentioning "overall" together with "passed" or
    /// "failed" decides.
    pub fn from_stdout(stdout: &str) -> Self {
        for line in stdout.lines() {
            let line = line.to_lowercase();
            if !line.contains("overall") {
                continue;
            }
            if line.contains("passed") {
                return Verdict::Passed;
            }
            if line.contains("failed") {
                return Verdict::Failed;
            }
        }
        Verdict::Unknown
    }
}

/// Files of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPaths {
    pub script: PathBuf,
    pub job: PathBuf,
    pub report: PathBuf,
}

/// Everything a finished run produced, whatever its exit code.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub returncode: Option<i32>,
    pub overall_result: Verdict,
    pub stdout: String,
    pub stderr: String,
    /// Parsed `report.json`; `None` when missing, empty or not JSON.
    pub report: Option<Value>,
    pub artifacts_dir: PathBuf,
    pub paths: RunPaths,
    /// Whether the run directory was kept on disk.
    pub retained: bool,
}

/// Runs test scripts through the external test binary.
pub struct ScriptRunner {
    program: String,
    artifacts_dir: PathBuf,
    keep_artifacts: bool,
    testbed_path: PathBuf,
    spawner: Arc<dyn ProcessSpawner>,
}

impl ScriptRunner {
    pub fn new(
        program: impl Into<String>,
        artifacts_dir: impl Into<PathBuf>,
        testbed_path: impl Into<PathBuf>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        Self {
            program: program.into(),
            artifacts_dir: artifacts_dir.into(),
            keep_artifacts: true,
            testbed_path: testbed_path.into(),
            spawner,
        }
    }

    /// Keep or delete run directories after a completed run.
    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Check, stage and run one script.
    pub async fn run(&self, script: &str, timeout: Duration) -> Result<RunReport, ScriptError> {
        check_script(script)?;

        let run_id = new_run_id();
        let run_dir = self.artifacts_dir.join(&run_id);
        let paths = RunPaths {
            script: run_dir.join(SCRIPT_FILE),
            job: run_dir.join(JOB_FILE),
            report: run_dir.join(REPORT_FILE),
        };

        create_dir(&run_dir).await?;
        write_file(&paths.script, script).await?;
        write_file(&paths.job, &job_file(&paths.script)).await?;

        let spec = ProcessSpec {
            program: self.program.clone(),
            args: vec![
                "run".to_string(),
                "job".to_string(),
                paths.job.display().to_string(),
                "--json-job".to_string(),
                paths.report.display().to_string(),
            ],
            cwd: run_dir.clone(),
            env: vec![(
                TESTBED_ENV.to_string(),
                self.testbed_path.display().to_string(),
            )],
            timeout,
        };

        info!("Running test job {} ({}s limit)", run_id, timeout.as_secs());
        let output = self
            .spawner
            .run(&spec)
            .await
            .map_err(|source| ScriptError::Spawn {
                program: self.program.clone(),
                artifacts_dir: run_dir.clone(),
                source,
            })?
            .ok_or_else(|| ScriptError::Timeout {
                after: timeout,
                artifacts_dir: run_dir.clone(),
            })?;

        let report = read_report(&paths.report).await;
        let overall_result = Verdict::from_stdout(&output.stdout);
        info!(
            "Test job {} finished: returncode {:?}, overall {:?}",
            run_id, output.code, overall_result
        );

        if !self.keep_artifacts {
            if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
                warn!("Failed to remove {}: {}", run_dir.display(), e);
            }
        }

        Ok(RunReport {
            run_id,
            returncode: output.code,
            overall_result,
            stdout: output.stdout,
            stderr: output.stderr,
            report,
            artifacts_dir: run_dir,
            paths,
            retained: self.keep_artifacts,
        })
    }
}

/// `test_<unix millis>_<8 hex chars>`
fn new_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("test_{}_{}", millis, &suffix[..8])
}

fn job_file(script: &Path) -> String {
    let escaped = script
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!(
        "from pyats.easypy import run\ndef main(runtime):\n    run(testscript='{escaped}', runtime=runtime)\n"
    )
}

async fn create_dir(path: &Path) -> Result<(), ScriptError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ScriptError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, contents: &str) -> Result<(), ScriptError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ScriptError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

async fn read_report(path: &Path) -> Option<Value> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            debug!("No report at {}: {}", path.display(), e);
            return None;
        }
    };
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse report JSON at {}: {}", path.display(), e);
            None
        }
    }
}
