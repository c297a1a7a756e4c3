//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DeviceError, ParseError, TopologyError};
use crate::parser::{OutputParser, ParserRegistry};
use crate::script::{ProcessOutput, ProcessSpawner, ProcessSpec};
use crate::session::{ConnectOptions, DeviceClient, DeviceFactory};
use crate::topology::{DeviceSpec, TopologyLoader, TopologySnapshot, parse_testbed};

/// Serves a fixed testbed and counts loads.
pub(crate) struct CountingLoader {
    yaml: String,
    loads: AtomicUsize,
    fail_next: AtomicBool,
}

impl CountingLoader {
    /// Devices with `os: iosxe`.
    pub(crate) fn new(names: &[&str]) -> Self {
        let devices: Vec<(&str, &str)> = names.iter().map(|name| (*name, "iosxe")).collect();
        Self::with_devices(&devices)
    }

    pub(crate) fn with_devices(devices: &[(&str, &str)]) -> Self {
        let mut yaml = String::from(
            "testbed:\n  name: fake\n  credentials:\n    default: { username: admin, password: admin }\ndevices:\n",
        );
        for (name, os) in devices {
            yaml.push_str(&format!(
                "  {name}:\n    os: {os}\n    connections:\n      cli: {{ protocol: ssh, ip: 127.0.0.1 }}\n"
            ));
        }
        Self {
            yaml,
            loads: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TopologyLoader for CountingLoader {
    async fn load(&self) -> Result<TopologySnapshot, TopologyError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TopologyError::Read {
                path: "fake-testbed".into(),
                source: io::Error::new(io::ErrorKind::Other, "injected failure"),
            });
        }
        parse_testbed(&self.yaml, Path::new("fake-testbed"))
    }

    fn source(&self) -> String {
        "fake-testbed".to_string()
    }
}

/// Shared state behind every [`FakeDevice`] a [`FakeFactory`] creates.
#[derive(Default)]
struct FakeState {
    created: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    drop_on_execute: AtomicBool,
    connect_delay: Mutex<Duration>,
    execute_delay: Mutex<Duration>,
    responses: Mutex<HashMap<String, String>>,
    rejections: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<String>>,
    configured: Mutex<Vec<Vec<String>>>,
}

/// Creates in-memory devices and records what they were asked to do.
#[derive(Default)]
pub(crate) struct FakeFactory {
    state: Arc<FakeState>,
}

impl FakeFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_disconnect(&self, fail: bool) {
        self.state.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Make every execute drop the session.
    pub(crate) fn drop_on_execute(&self, drop: bool) {
        self.state.drop_on_execute.store(drop, Ordering::SeqCst);
    }

    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    pub(crate) fn set_execute_delay(&self, delay: Duration) {
        *self.state.execute_delay.lock().unwrap() = delay;
    }

    pub(crate) fn respond(&self, command: &str, output: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
    }

    /// Make the device refuse `command` with `marker`.
    pub(crate) fn reject(&self, command: &str, marker: &str) {
        self.state
            .rejections
            .lock()
            .unwrap()
            .insert(command.to_string(), marker.to_string());
    }

    /// Commands executed so far, as `device: command`.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    /// Line batches passed to configure.
    pub(crate) fn configured(&self) -> Vec<Vec<String>> {
        self.state.configured.lock().unwrap().clone()
    }
}

impl DeviceFactory for FakeFactory {
    fn create(&self, name: &str, _spec: &DeviceSpec) -> Result<Box<dyn DeviceClient>, DeviceError> {
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDevice {
            name: name.to_string(),
            connected: false,
            state: self.state.clone(),
        }))
    }
}

struct FakeDevice {
    name: String,
    connected: bool,
    state: Arc<FakeState>,
}

#[async_trait]
impl DeviceClient for FakeDevice {
    async fn connect(&mut self, _options: &ConnectOptions) -> Result<(), DeviceError> {
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DeviceError::ConnectFailed {
                device: self.name.clone(),
                message: "connection refused".into(),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&mut self, command: &str, _timeout: Duration) -> Result<String, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        self.state
            .commands
            .lock()
            .unwrap()
            .push(format!("{}: {}", self.name, command));

        let delay = *self.state.execute_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.drop_on_execute.load(Ordering::SeqCst) {
            self.connected = false;
            return Err(DeviceError::Disconnected);
        }
        if let Some(marker) = self.state.rejections.lock().unwrap().get(command) {
            return Err(DeviceError::CommandRejected {
                command: command.to_string(),
                marker: marker.clone(),
            });
        }
        Ok(self
            .state
            .responses
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| format!("output of {command}")))
    }

    async fn configure(
        &mut self,
        lines: &[String],
        _timeout: Duration,
    ) -> Result<String, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        self.state.configured.lock().unwrap().push(lines.to_vec());
        Ok(lines
            .iter()
            .map(|line| format!("{}(config)#{}", self.name, line))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        if self.state.fail_disconnect.load(Ordering::SeqCst) {
            return Err(DeviceError::CommandFailed {
                message: "socket already closed".into(),
            });
        }
        Ok(())
    }
}

/// Offers one parser, named `fake`, for one command.
pub(crate) struct FakeParsers {
    command: String,
    result: Option<Value>,
}

impl FakeParsers {
    pub(crate) fn new(command: &str, result: Value) -> Self {
        Self {
            command: command.to_string(),
            result: Some(result),
        }
    }

    /// A parser that always fails.
    pub(crate) fn failing(command: &str) -> Self {
        Self {
            command: command.to_string(),
            result: None,
        }
    }
}

impl ParserRegistry for FakeParsers {
    fn get_parser(&self, command: &str, _device: &DeviceSpec) -> Option<Arc<dyn OutputParser>> {
        (command == self.command).then(|| {
            Arc::new(FakeParser {
                result: self.result.clone(),
            }) as Arc<dyn OutputParser>
        })
    }
}

struct FakeParser {
    result: Option<Value>,
}

impl OutputParser for FakeParser {
    fn name(&self) -> &str {
        "fake"
    }

    fn parse(&self, _text: &str) -> Result<Value, ParseError> {
        self.result.clone().ok_or_else(|| ParseError::Failed {
            parser: "fake".into(),
            message: "schema mismatch".into(),
        })
    }
}

/// Stands in for the test runner binary.
///
/// Records each spec and, unless told to time out, writes `report` to the
/// path following `--json-job`.
pub(crate) struct FakeSpawner {
    output: ProcessOutput,
    report: Option<String>,
    time_out: bool,
    specs: Mutex<Vec<ProcessSpec>>,
}

impl FakeSpawner {
    pub(crate) fn new(code: i32, stdout: &str, report: Option<&str>) -> Self {
        Self {
            output: ProcessOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            report: report.map(str::to_string),
            time_out: false,
            specs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn timing_out() -> Self {
        Self {
            time_out: true,
            ..Self::new(0, "", None)
        }
    }

    pub(crate) fn specs(&self) -> Vec<ProcessSpec> {
        self.specs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessSpawner for FakeSpawner {
    async fn run(&self, spec: &ProcessSpec) -> io::Result<Option<ProcessOutput>> {
        self.specs.lock().unwrap().push(spec.clone());
        if self.time_out {
            return Ok(None);
        }
        if let Some(report) = &self.report {
            let path = spec
                .args
                .iter()
                .position(|arg| arg == "--json-job")
                .and_then(|i| spec.args.get(i + 1))
                .expect("--json-job argument");
            std::fs::write(Path::new(path), report)?;
        }
        Ok(Some(self.output.clone()))
    }
}
