//! Terminal output cleaning.
//!
//! Device output arrives with colour codes, cursor movement and the odd
//! control byte. [`clean_output`] reduces it to stable printable text.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// ANSI/VT100 escape introducer grammar: two-byte escapes and CSI sequences.
const ANSI_PATTERN: &str = r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])";

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(ANSI_PATTERN).expect("ANSI pattern is valid"));

static ANSI_ESCAPE_BYTES: Lazy<regex::bytes::Regex> =
    Lazy::new(|| regex::bytes::Regex::new(ANSI_PATTERN).expect("ANSI pattern is valid"));

/// Remove escape sequences and every character outside the ASCII printable set.
pub fn clean_output(raw: &str) -> String {
    ANSI_ESCAPE
        .replace_all(raw, "")
        .chars()
        .filter(|&ch| is_printable(ch))
        .collect()
}

/// Strip escape sequences from raw channel bytes, leaving everything else.
pub fn strip_ansi(data: &[u8]) -> Cow<'_, [u8]> {
    ANSI_ESCAPE_BYTES.replace_all(data, &b""[..])
}

/// Letters, digits, punctuation and whitespace.
fn is_printable(ch: char) -> bool {
    ch.is_ascii_graphic() || matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}
