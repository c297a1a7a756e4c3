//! Environment-driven settings.
//!
//! | Variable                     | Default                  |
//! |------------------------------|--------------------------|
//! | `NETPILOT_TESTBED_PATH`      | required                 |
//! | `NETPILOT_ARTIFACTS_DIR`     | `~/.netpilot/artifacts`  |
//! | `NETPILOT_KEEP_ARTIFACTS`    | `1`                      |
//! | `NETPILOT_TESTBED_CACHE_TTL` | `30` seconds             |
//! | `NETPILOT_CONN_CACHE_TTL`    | `0` (no session caching) |
//! | `NETPILOT_TEMPLATE_DIR`      | unset (no parsing)       |
//! | `NETPILOT_TEST_RUNNER`       | `pyats` from `PATH`      |

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, warn};

use crate::error::ConfigError;

pub const TESTBED_PATH: &str = "NETPILOT_TESTBED_PATH";
pub const ARTIFACTS_DIR: &str = "NETPILOT_ARTIFACTS_DIR";
pub const KEEP_ARTIFACTS: &str = "NETPILOT_KEEP_ARTIFACTS";
pub const TESTBED_CACHE_TTL: &str = "NETPILOT_TESTBED_CACHE_TTL";
pub const CONN_CACHE_TTL: &str = "NETPILOT_CONN_CACHE_TTL";
pub const TEMPLATE_DIR: &str = "NETPILOT_TEMPLATE_DIR";
pub const TEST_RUNNER: &str = "NETPILOT_TEST_RUNNER";

const DEFAULT_RUNNER: &str = "pyats";

/// Validated runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Testbed YAML; checked to exist.
    pub testbed_path: PathBuf,

    /// Root under which each script run gets its own directory.
    pub artifacts_dir: PathBuf,

    /// Keep run directories after completed runs.
    pub keep_artifacts: bool,

    /// How long a loaded testbed is served before reloading.
    pub testbed_cache_ttl: Duration,

    /// How long an idle session is kept; zero disables caching.
    pub conn_cache_ttl: Duration,

    /// TextFSM template root.
    pub template_dir: Option<PathBuf>,

    /// Test-execution binary.
    pub test_runner: String,
}

impl Settings {
    /// Read settings from the process environment, after loading `.env`
    /// from the working directory or its parents if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let testbed_path = get(TESTBED_PATH)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing { name: TESTBED_PATH })?;
        if !testbed_path.is_file() {
            return Err(ConfigError::TestbedNotFound(testbed_path));
        }

        let artifacts_dir = match get(ARTIFACTS_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|home| home.join(".netpilot").join("artifacts"))
                .ok_or(ConfigError::Missing {
                    name: ARTIFACTS_DIR,
                })?,
        };

        let keep_artifacts = get(KEEP_ARTIFACTS).is_none_or(|v| v.trim() == "1");

        let test_runner = get(TEST_RUNNER).unwrap_or_else(|| {
            which::which(DEFAULT_RUNNER)
                .map(|path| path.display().to_string())
                .unwrap_or_else(|_| DEFAULT_RUNNER.to_string())
        });

        Ok(Self {
            testbed_path,
            artifacts_dir,
            keep_artifacts,
            testbed_cache_ttl: ttl(TESTBED_CACHE_TTL, get(TESTBED_CACHE_TTL), 30)?,
            conn_cache_ttl: ttl(CONN_CACHE_TTL, get(CONN_CACHE_TTL), 0)?,
            template_dir: get(TEMPLATE_DIR).map(PathBuf::from),
            test_runner,
        })
    }
}

/// Whole seconds; negative values clamp to zero.
fn ttl(name: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };
    let secs: i64 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: e.to_string(),
        }
    })?;
    Ok(Duration::from_secs(secs.max(0) as u64))
}
