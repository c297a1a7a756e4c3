//! Subprocess spawning behind a trait, so the runner can be tested
//! without the real test binary.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added to the inherited environment.
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a process to completion within its time bound.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// `Ok(None)` means the process outlived `spec.timeout` and was killed.
    async fn run(&self, spec: &ProcessSpec) -> io::Result<Option<ProcessOutput>>;
}

/// [`ProcessSpawner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessSpawner;

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn run(&self, spec: &ProcessSpec) -> io::Result<Option<ProcessOutput>> {
        debug!("Spawning {} {:?}", spec.program, spec.args);

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(spec.timeout, collect(&mut child)).await {
            Ok(output) => output.map(Some),
            Err(_) => {
                warn!(
                    "{} exceeded {}s, killing it",
                    spec.program,
                    spec.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", spec.program, e);
                }
                Ok(None)
            }
        }
    }
}

async fn collect(child: &mut Child) -> io::Result<ProcessOutput> {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let (status, read_out, read_err) = tokio::join!(
        child.wait(),
        read_all(stdout_pipe.as_mut(), &mut stdout),
        read_all(stderr_pipe.as_mut(), &mut stderr),
    );
    read_out?;
    read_err?;

    Ok(ProcessOutput {
        code: status?.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) -> io::Result<()> {
    if let Some(pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ProcessSpec {
        ProcessSpec {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: std::env::temp_dir(),
            env: vec![("NETPILOT_MARKER".into(), "42".into())],
            timeout,
        }
    }

    #[tokio::test]
    async fn test_captures_output_and_env() {
        let output = TokioProcessSpawner
            .run(&sh("echo out $NETPILOT_MARKER; echo err >&2; exit 3", Duration::from_secs(10)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out 42\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let start = std::time::Instant::now();
        let output = TokioProcessSpawner
            .run(&sh("sleep 30", Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(output.is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let spec = ProcessSpec {
            program: "/nonexistent/netpilot-runner".into(),
            ..sh("", Duration::from_secs(1))
        };
        assert!(TokioProcessSpawner.run(&spec).await.is_err());
    }
}
