//! Builder for the [`Netpilot`] service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::Netpilot;
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::exec::CommandPipeline;
use crate::parser::{NoParsers, ParserRegistry, TextFsmRegistry};
use crate::script::{ProcessSpawner, ScriptRunner, TokioProcessSpawner};
use crate::session::{ConnectOptions, DeviceFactory, SessionCache, SshDeviceFactory};
use crate::settings::{self, Settings};
use crate::topology::{TopologyCache, TopologyLoader, YamlTopologyLoader};

/// Builder for constructing the service.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use netpilot::NetpilotBuilder;
///
/// # fn example() -> Result<(), netpilot::error::ConfigError> {
/// let netpilot = NetpilotBuilder::new()
///     .testbed("lab/testbed.yaml")
///     .conn_cache_ttl(Duration::from_secs(300))
///     .template_dir("lab/templates")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct NetpilotBuilder {
    loader: Option<Arc<dyn TopologyLoader>>,
    testbed_path: Option<PathBuf>,
    factory: Option<Arc<dyn DeviceFactory>>,
    parsers: Option<Arc<dyn ParserRegistry>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    clock: Option<Arc<dyn Clock>>,
    testbed_cache_ttl: Duration,
    conn_cache_ttl: Duration,
    connect_options: ConnectOptions,
    artifacts_dir: Option<PathBuf>,
    keep_artifacts: bool,
    test_runner: String,
}

impl Default for NetpilotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NetpilotBuilder {
    pub fn new() -> Self {
        Self {
            loader: None,
            testbed_path: None,
            factory: None,
            parsers: None,
            spawner: None,
            clock: None,
            testbed_cache_ttl: Duration::from_secs(30),
            conn_cache_ttl: Duration::ZERO,
            connect_options: ConnectOptions::default(),
            artifacts_dir: None,
            keep_artifacts: true,
            test_runner: "pyats".to_string(),
        }
    }

    /// Start from validated settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut builder = Self::new()
            .testbed(&settings.testbed_path)
            .testbed_cache_ttl(settings.testbed_cache_ttl)
            .conn_cache_ttl(settings.conn_cache_ttl)
            .artifacts_dir(&settings.artifacts_dir)
            .keep_artifacts(settings.keep_artifacts)
            .test_runner(&settings.test_runner);
        if let Some(dir) = &settings.template_dir {
            builder = builder.template_dir(dir);
        }
        builder
    }

    /// Read the testbed from a YAML file.
    pub fn testbed(mut self, path: impl Into<PathBuf>) -> Self {
        self.testbed_path = Some(path.into());
        self
    }

    /// Use a custom testbed source instead of a file.
    pub fn loader(mut self, loader: Arc<dyn TopologyLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set how devices are reached (default: SSH).
    pub fn device_factory(mut self, factory: Arc<dyn DeviceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the parser registry (default: none, raw output only).
    pub fn parsers(mut self, parsers: Arc<dyn ParserRegistry>) -> Self {
        self.parsers = Some(parsers);
        self
    }

    /// Parse output with TextFSM templates from `dir`.
    pub fn template_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.parsers(Arc::new(TextFsmRegistry::new(dir)))
    }

    pub fn process_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn testbed_cache_ttl(mut self, ttl: Duration) -> Self {
        self.testbed_cache_ttl = ttl;
        self
    }

    /// Idle lifetime of cached sessions; zero disconnects after every
    /// operation.
    pub fn conn_cache_ttl(mut self, ttl: Duration) -> Self {
        self.conn_cache_ttl = ttl;
        self
    }

    pub fn connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect_options = options;
        self
    }

    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn test_runner(mut self, program: impl Into<String>) -> Self {
        self.test_runner = program.into();
        self
    }

    /// Build the service. Nothing is loaded or connected yet.
    pub fn build(self) -> Result<Netpilot, ConfigError> {
        let testbed_path = self.testbed_path.clone();
        let loader: Arc<dyn TopologyLoader> = match (self.loader, &testbed_path) {
            (Some(loader), _) => loader,
            (None, Some(path)) => Arc::new(YamlTopologyLoader::new(path)),
            (None, None) => {
                return Err(ConfigError::Missing {
                    name: settings::TESTBED_PATH,
                });
            }
        };

        let artifacts_dir = match self.artifacts_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .map(|home| home.join(".netpilot").join("artifacts"))
                .ok_or(ConfigError::Missing {
                    name: settings::ARTIFACTS_DIR,
                })?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(SshDeviceFactory::new()));
        let parsers = self.parsers.unwrap_or_else(|| Arc::new(NoParsers));
        let spawner = self
            .spawner
            .unwrap_or_else(|| Arc::new(TokioProcessSpawner));

        let topology = Arc::new(TopologyCache::new(
            loader,
            self.testbed_cache_ttl,
            clock.clone(),
        ));
        let sessions = Arc::new(
            SessionCache::new(topology.clone(), factory, self.conn_cache_ttl, clock)
                .with_connect_options(self.connect_options),
        );
        let pipeline = CommandPipeline::new(sessions.clone(), parsers);

        // The runner hands the testbed to the test binary by path; with a
        // custom loader there may be none.
        let runner_testbed = testbed_path.unwrap_or_else(|| PathBuf::from(topology.source()));
        let scripts = ScriptRunner::new(self.test_runner, artifacts_dir, runner_testbed, spawner)
            .keep_artifacts(self.keep_artifacts);

        Ok(Netpilot {
            topology,
            sessions,
            pipeline,
            scripts,
        })
    }
}
