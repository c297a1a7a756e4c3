//! Per-OS CLI profiles for the SSH device client.
//!
//! A profile describes how to recognise a prompt, how to page through
//! long output, how to enter and leave configuration mode, and which
//! output markers mean the device refused a command.

pub mod vendors;

use regex::bytes::Regex;

/// CLI behavior of one operating system family.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    /// Profile name (e.g., "cisco_iosxe", "juniper_junos").
    pub name: String,

    /// Matches any prompt the session can sit at, exec or configuration.
    pub prompt: Regex,

    /// Matches a pager marker that needs a keypress to continue.
    pub pager: Option<Regex>,

    /// Commands that enter configuration mode.
    pub config_enter: Vec<String>,

    /// Commands that leave configuration mode (and commit, where needed).
    pub config_exit: Vec<String>,

    /// Commands that leave configuration mode after a rejected line,
    /// discarding pending changes where the platform stages them.
    pub config_abort: Vec<String>,

    /// Output substrings that indicate a rejected command.
    pub failed_when_contains: Vec<String>,

    /// Session setup commands, skipped when init commands are disabled.
    pub on_open_commands: Vec<String>,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,
}

impl PlatformProfile {
    /// Create a profile with a prompt pattern and nothing else.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: Regex::new(prompt)?,
            pager: None,
            config_enter: vec![],
            config_exit: vec![],
            config_abort: vec![],
            failed_when_contains: vec![],
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        })
    }

    /// Set the pager pattern.
    pub fn with_pager(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pager = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Set the configuration mode entry and exit commands. The exit
    /// commands double as the abort sequence unless one is set later.
    pub fn with_config_mode(mut self, enter: &[&str], exit: &[&str]) -> Self {
        self.config_enter = enter.iter().map(|s| s.to_string()).collect();
        self.config_exit = exit.iter().map(|s| s.to_string()).collect();
        self.config_abort = self.config_exit.clone();
        self
    }

    /// Set the commands used to bail out of configuration mode.
    pub fn with_config_abort(mut self, abort: &[&str]) -> Self {
        self.config_abort = abort.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Whether the platform has a configuration mode at all.
    pub fn supports_config(&self) -> bool {
        !self.config_enter.is_empty()
    }

    /// The first failure marker found in `output`, if any.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|marker| output.contains(marker.as_str()))
            .map(String::as_str)
    }

    /// Pick the profile for a testbed `os` value.
    pub fn for_os(os: &str) -> Self {
        match os.to_lowercase().as_str() {
            "ios" | "iosxe" | "iosxr" | "nxos" | "asa" => vendors::cisco(os),
            "eos" => vendors::arista(),
            "junos" => vendors::juniper(),
            "linux" => vendors::linux(),
            _ => vendors::generic(),
        }
    }
}

/// Extract the device hostname from a prompt line.
///
/// Handles `R1#`, `R1(config-if)#`, `admin@switch>`, `user@host:~$`
/// and IOS-XR `RP/0/RSP0/CPU0:R1#` shapes.
pub fn hostname_from_prompt(output: &str) -> Option<String> {
    let line = output.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_end_matches(['>', '#', '$', '%', ' ']);
    let line = line.split('(').next().unwrap_or(line);
    let host = match line.rsplit_once('@') {
        // user@host:path
        Some((_, rest)) => rest.split(':').next().unwrap_or(rest),
        // node:host
        None => line.rsplit(':').next().unwrap_or(line),
    };
    (!host.is_empty()).then(|| host.to_string())
}
