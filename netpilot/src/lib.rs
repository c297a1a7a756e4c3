//! # Netpilot
//!
//! Device session and command execution layer for network automation tools.
//!
//! Netpilot sits between a tool front end (an MCP server, a CLI, a web hook)
//! and the devices of a pyATS-style testbed. It provides:
//!
//! - A TTL-cached view of the testbed YAML
//! - Cached SSH sessions, one per device, with per-device serialization
//! - Validated `show` commands and normalized configuration payloads
//! - Output cleanup and optional TextFSM parsing
//! - Sandboxed runs of user-supplied test scripts through the test runner
//!
//! Device operations return an outcome value instead of an error, so a front
//! end can serialize any result straight to JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netpilot::{Netpilot, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netpilot::Error> {
//!     let settings = Settings::from_env()?;
//!     let netpilot = Netpilot::from_settings(&settings)?;
//!     netpilot.check_testbed().await?;
//!
//!     let outcome = netpilot.show("R1", "show version").await;
//!     println!("{}", outcome.to_json());
//!
//!     netpilot.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod clock;
pub mod command;
pub mod error;
pub mod exec;
pub mod parser;
pub mod platform;
pub mod script;
pub mod service;
pub mod session;
pub mod settings;
pub mod topology;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use command::ConfigPayload;
pub use error::{Error, ErrorKind, Result};
pub use exec::{ExecutionOutcome, InventoryOutcome, Operation};
pub use script::{RunReport, ScriptOutcome, Verdict};
pub use service::{Netpilot, NetpilotBuilder};
pub use settings::Settings;
pub use topology::{DeviceSpec, TopologySnapshot};
pub use transport::{AuthMethod, SshConfig};
