//! Channel-level text handling.
//!
//! Output cleaning for everything returned to callers, and the tail-search
//! buffer the SSH client reads into.

mod buffer;
mod clean;

pub use buffer::PatternBuffer;
pub use clean::{clean_output, strip_ansi};
