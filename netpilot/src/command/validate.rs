//! Show-command validation.
//!
//! This is input sanitation for read-only requests, not a security boundary:
//! every caller goes through the same three checks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

/// Characters that would pipe or redirect output on most CLIs.
const BLOCKED_CHARS: &[char] = &['|', '>', '<'];

/// Words that must never appear in a show request.
const BLOCKED_TERMS: &[&str] = &[
    "copy",
    "delete",
    "erase",
    "reload",
    "write",
    "configure",
    "conf",
];

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_-]+").expect("token pattern is valid"));

/// Check that `command` is a plain, read-only `show` command.
///
/// Returns the first rule the command breaks.
pub fn validate_show_command(command: &str) -> Result<(), ValidationError> {
    let lowered = command.trim().to_lowercase();

    if !lowered.starts_with("show") {
        return Err(ValidationError::NotShowCommand {
            command: command.to_string(),
        });
    }

    if lowered.contains(BLOCKED_CHARS) {
        return Err(ValidationError::PipeOrRedirect {
            command: command.to_string(),
        });
    }

    if let Some(term) = TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .find(|token| BLOCKED_TERMS.contains(token))
    {
        return Err(ValidationError::DisallowedTerm {
            command: command.to_string(),
            term: term.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_show() {
        assert!(validate_show_command("show version").is_ok());
        assert!(validate_show_command("  SHOW ip interface brief ").is_ok());
        assert!(validate_show_command("show running-config interface Gi0/0").is_ok());
    }

    #[test]
    fn test_rejects_non_show() {
        let err = validate_show_command("delete flash:old.bin").unwrap_err();
        assert!(matches!(err, ValidationError::NotShowCommand { .. }));
        assert_eq!(
            err.to_string(),
            "Command 'delete flash:old.bin' is not a 'show' command."
        );

        assert!(validate_show_command("").is_err());
    }

    #[test]
    fn test_rejects_pipe_and_redirect() {
        for cmd in [
            "show running-config | include foo",
            "show version > flash:out.txt",
            "show tech < input",
        ] {
            let err = validate_show_command(cmd).unwrap_err();
            assert!(matches!(err, ValidationError::PipeOrRedirect { .. }), "{cmd}");
        }
    }

    #[test]
    fn test_rejects_destructive_terms() {
        let err = validate_show_command("show delete flash:old.bin").unwrap_err();
        assert_eq!(
            err,
            ValidationError::DisallowedTerm {
                command: "show delete flash:old.bin".into(),
                term: "delete".into(),
            }
        );

        let err = validate_show_command("show conf t").unwrap_err();
        assert!(matches!(err, ValidationError::DisallowedTerm { ref term, .. } if term == "conf"));
    }

    #[test]
    fn test_terms_match_whole_tokens_only() {
        // "running-config" is one token, and "configuration" is not "configure".
        assert!(validate_show_command("show running-config").is_ok());
        assert!(validate_show_command("show configuration commit list").is_ok());
        assert!(validate_show_command("show copyright").is_ok());
    }

    #[test]
    fn test_pipe_checked_before_terms() {
        let err = validate_show_command("show run | write").unwrap_err();
        assert!(matches!(err, ValidationError::PipeOrRedirect { .. }));
    }
}
