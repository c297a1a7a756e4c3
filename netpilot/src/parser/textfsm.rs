//! TextFSM template registry, backed by `textfsm-rust`.
//!
//! Templates live in one directory per OS, named after the command with
//! spaces replaced by underscores:
//!
//! ```text
//! templates/
//!   iosxe/show_ip_interface_brief.textfsm
//!   linux/uname_-a.textfsm
//!   generic/show_version.textfsm
//! ```
//!
//! The device's OS directory is searched first, then `generic/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use textfsm_rust::Template;

use super::{OutputParser, ParserRegistry};
use crate::error::ParseError;
use crate::topology::DeviceSpec;

const FALLBACK_DIR: &str = "generic";
const EXTENSION: &str = "textfsm";

/// Looks up templates on disk.
#[derive(Debug, Clone)]
pub struct TextFsmRegistry {
    dir: PathBuf,
}

impl TextFsmRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, command: &str, os: &str) -> Vec<PathBuf> {
        let file = format!("{}.{}", template_stem(command), EXTENSION);
        let mut paths = vec![self.dir.join(os).join(&file)];
        if os != FALLBACK_DIR {
            paths.push(self.dir.join(FALLBACK_DIR).join(&file));
        }
        paths
    }
}

impl ParserRegistry for TextFsmRegistry {
    fn get_parser(&self, command: &str, device: &DeviceSpec) -> Option<Arc<dyn OutputParser>> {
        let os = device.os_name();
        let path = self
            .candidates(command, &os)
            .into_iter()
            .find(|path| path.is_file())?;

        match TextFsmParser::from_file(&path) {
            Ok(parser) => Some(Arc::new(parser)),
            Err(e) => {
                debug!("Skipping template for '{}': {}", command, e);
                None
            }
        }
    }
}

/// One compiled-on-use TextFSM template.
#[derive(Debug, Clone)]
pub struct TextFsmParser {
    name: String,
    source: String,
}

impl TextFsmParser {
    /// Build a parser from template text. The template is checked here so
    /// a broken one is never offered.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self, ParseError> {
        let name = name.into();
        let source = source.into();
        Template::parse_str(&source).map_err(|e| ParseError::Template {
            path: PathBuf::from(&name),
            message: e.to_string(),
        })?;
        Ok(Self { name, source })
    }

    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let source = std::fs::read_to_string(path).map_err(|e| ParseError::Template {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let os = path
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(format!("textfsm:{os}/{stem}"), source)
    }
}

impl OutputParser for TextFsmParser {
    fn name(&self) -> &str {
        &self.name
    }

    /// One JSON object per record, keyed by the template's value names
    /// lower-cased (`Value Hostname` becomes `"hostname"`).
    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let failed = |message: String| ParseError::Failed {
            parser: self.name.clone(),
            message,
        };

        let template = Template::parse_str(&self.source).map_err(|e| failed(e.to_string()))?;
        let mut parser = template.parser();
        let records: Vec<HashMap<String, String>> = parser
            .parse_text_to_dicts(text)
            .map_err(|e| failed(e.to_string()))?;

        if records.is_empty() {
            return Err(ParseError::Empty {
                parser: self.name.clone(),
            });
        }
        serde_json::to_value(records).map_err(|e| failed(e.to_string()))
    }
}

/// `show ip  interface brief` -> `show_ip_interface_brief`
fn template_stem(command: &str) -> String {
    command
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
