//! Configuration payload normalization.
//!
//! Callers hand over configuration either as a list of lines or as one
//! multi-line block, often with `configure terminal` / `end` wrapped around
//! it or several commands joined with `;`. The pipeline enters and leaves
//! configuration mode itself, so the wrappers are removed here. Leading
//! indentation is kept: sub-mode lines depend on it, and `exit` lines are
//! needed to leave a sub-mode.

use serde_json::Value;

/// Mode-entry/exit commands the pipeline issues on its own.
const WRAPPER_LINES: &[&str] = &[
    "configure terminal",
    "conf t",
    "config t",
    "configure t",
    "end",
];

/// A configuration payload as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    /// One CLI line per element.
    Lines(Vec<String>),
    /// A multi-line block, possibly indented as a whole.
    Block(String),
}

impl ConfigPayload {
    /// Interpret a JSON argument: arrays become lines (non-string elements
    /// are stringified), strings become a block, anything else is empty.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => ConfigPayload::Lines(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::String(s) => ConfigPayload::Block(s.clone()),
            Value::Null => ConfigPayload::Lines(Vec::new()),
            other => ConfigPayload::Block(other.to_string()),
        }
    }
}

impl From<Vec<String>> for ConfigPayload {
    fn from(lines: Vec<String>) -> Self {
        ConfigPayload::Lines(lines)
    }
}

impl From<&[&str]> for ConfigPayload {
    fn from(lines: &[&str]) -> Self {
        ConfigPayload::Lines(lines.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&str> for ConfigPayload {
    fn from(block: &str) -> Self {
        ConfigPayload::Block(block.to_string())
    }
}

impl From<String> for ConfigPayload {
    fn from(block: String) -> Self {
        ConfigPayload::Block(block)
    }
}

/// Turn a payload into the ordered CLI lines to send in configuration mode.
pub fn normalize_config(payload: &ConfigPayload) -> Vec<String> {
    let raw_lines = match payload {
        ConfigPayload::Lines(lines) => lines.clone(),
        ConfigPayload::Block(block) => dedent_lines(block),
    };

    let mut out = Vec::with_capacity(raw_lines.len());
    for line in &raw_lines {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        if line.contains(';') {
            out.extend(
                line.split(';')
                    .map(str::trim)
                    .filter(|part| !part.is_empty() && !is_wrapper(part))
                    .map(str::to_string),
            );
            continue;
        }

        if is_wrapper(line.trim()) {
            continue;
        }

        out.push(line.to_string());
    }
    out
}

fn is_wrapper(line: &str) -> bool {
    WRAPPER_LINES
        .iter()
        .any(|wrapper| wrapper.eq_ignore_ascii_case(line))
}

/// Split a block into lines after removing the indentation shared by every
/// non-blank line. Whitespace-only lines come back empty.
fn dedent_lines(block: &str) -> Vec<String> {
    let lines: Vec<&str> = block.lines().collect();

    let mut margin: Option<&str> = None;
    for line in &lines {
        if line.trim().is_empty() {
            continue;
        }
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let indent = &line[..indent_len];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = margin.unwrap_or("");

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                line.strip_prefix(margin).unwrap_or(line).to_string()
            }
        })
        .collect()
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}
