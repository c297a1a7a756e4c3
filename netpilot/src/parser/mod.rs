//! Structured parsing of command output.
//!
//! Parsing is best effort. A command with no parser, or whose parser
//! fails, is reported with its raw text only.

mod textfsm;

pub use textfsm::{TextFsmParser, TextFsmRegistry};

use std::sync::Arc;

use serde_json::Value;

use crate::error::ParseError;
use crate::topology::DeviceSpec;

/// Turns cleaned command output into a structured value.
pub trait OutputParser: Send + Sync {
    /// Identifier reported as `parser_used`.
    fn name(&self) -> &str;

    fn parse(&self, text: &str) -> Result<Value, ParseError>;
}

/// Finds the parser for a command on a given device.
pub trait ParserRegistry: Send + Sync {
    fn get_parser(&self, command: &str, device: &DeviceSpec) -> Option<Arc<dyn OutputParser>>;
}

/// A registry with no parsers; every command falls back to raw output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParsers;

impl ParserRegistry for NoParsers {
    fn get_parser(&self, _command: &str, _device: &DeviceSpec) -> Option<Arc<dyn OutputParser>> {
        None
    }
}
