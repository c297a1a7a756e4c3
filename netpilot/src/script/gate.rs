//! Denylist check for user-supplied test scripts.
//!
//! This is a filter for obvious misuse (opening sockets, connecting to
//! devices, spawning processes). It is not a sandbox: a determined script
//! can get past a denylist.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::ValidationError;

/// Modules a script may not import, matched as `import X` or `from X`.
pub const BANNED_IMPORTS: &[&str] = &[
    "socket",
    "requests",
    "urllib",
    "httpx",
    "telnetlib",
    "paramiko",
    "netmiko",
];

/// Case-insensitive patterns a script may not contain.
pub const BANNED_PATTERNS: &[&str] = &[
    r"\.connect\(",
    r"\.disconnect\(",
    r"Testbed\(",
    r"loader\.load",
    r"subprocess\.",
    r"os\.system",
    r"eval\(",
    r"exec\(",
    r"__import__",
];

static BANNED_REGEXES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    BANNED_PATTERNS
        .iter()
        .map(|pattern| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("banned pattern is a valid regex");
            (*pattern, regex)
        })
        .collect()
});

/// Reject empty scripts and scripts that hit the denylist. The first hit
/// is reported; imports are checked before patterns.
pub fn check_script(script: &str) -> Result<(), ValidationError> {
    if script.trim().is_empty() {
        return Err(ValidationError::EmptyScript);
    }

    let lower = script.to_lowercase();
    for module in BANNED_IMPORTS {
        if lower.contains(&format!("import {module}"))
            || lower.contains(&format!("from {module}"))
        {
            return Err(ValidationError::BannedImport {
                module: module.to_string(),
            });
        }
    }

    for (pattern, regex) in BANNED_REGEXES.iter() {
        if regex.is_match(script) {
            return Err(ValidationError::BannedPattern {
                pattern: pattern.to_string(),
            });
        }
    }

    Ok(())
}
