//! Built-in platform profiles.
//!
//! Prompt patterns accept both exec and configuration prompts, so one
//! pattern covers every step of a configuration sequence.
//!
//! ```text
//! R1>  R1#  R1(config)#  R1(config-if)#     cisco / arista
//! admin@mx1>  admin@mx1#                    junos
//! user@host:~$  root@host:~#                linux
//! ```

use super::PlatformProfile;

const CISCO_PROMPT: &str = r"(?m)^[\w.\-@()/: ]{1,63}[>#]\s?$";
const JUNOS_PROMPT: &str = r"(?m)^(?:\{\w+(?::\d)?\}\n)?[\w.\-@()/: ]{1,63}[>#%]\s?$";
const LINUX_PROMPT: &str = r"[$#]\s*$";
const GENERIC_PROMPT: &str = r"(?m)[>#$%]\s*$";

/// `--More--`, ` -- More -- ` and `---(more 45%)---` style pagers.
const PAGER: &str = r"(?i)-{2,}\s*\(?more[^\n-]*\)?\s*-{2,}\s*";

/// Cisco IOS, IOS-XE, IOS-XR, NX-OS and ASA.
pub fn cisco(os: &str) -> PlatformProfile {
    PlatformProfile::new(format!("cisco_{}", os.to_lowercase()), CISCO_PROMPT)
        .unwrap()
        .with_pager(PAGER)
        .unwrap()
        .with_config_mode(&["configure terminal"], &["end"])
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 0")
}

/// Arista EOS.
pub fn arista() -> PlatformProfile {
    PlatformProfile::new("arista_eos", CISCO_PROMPT)
        .unwrap()
        .with_pager(PAGER)
        .unwrap()
        .with_config_mode(&["configure terminal"], &["end"])
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Error")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 32767")
        .with_terminal_size(32767, 24)
}

/// Juniper JunOS. Configuration is committed on the way out.
pub fn juniper() -> PlatformProfile {
    PlatformProfile::new("juniper_junos", JUNOS_PROMPT)
        .unwrap()
        .with_pager(PAGER)
        .unwrap()
        .with_config_mode(&["configure"], &["commit and-quit"])
        .with_config_abort(&["rollback 0", "exit configuration-mode"])
        .with_failure_pattern("syntax error")
        .with_failure_pattern("unknown command")
        .with_failure_pattern("error: configuration check-out failed")
        .with_on_open_command("set cli screen-length 0")
        .with_on_open_command("set cli screen-width 511")
}

/// Linux shells. No configuration mode and no failure markers: command
/// output is returned as-is.
pub fn linux() -> PlatformProfile {
    PlatformProfile::new("linux", LINUX_PROMPT).unwrap()
}

/// Fallback for unknown operating systems.
pub fn generic() -> PlatformProfile {
    PlatformProfile::new("generic", GENERIC_PROMPT)
        .unwrap()
        .with_pager(PAGER)
        .unwrap()
        .with_config_mode(&["configure terminal"], &["end"])
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
}
