//! Read buffer for interactive device sessions.
//!
//! Prompt and pager detection only look at the tail of what has been read
//! so far, which keeps long outputs (full routing tables, `show tech`)
//! cheap to scan.

use std::ops::Range;

use bytes::BytesMut;
use regex::bytes::Regex;

use super::clean::strip_ansi;

/// Accumulates channel output and searches its tail for patterns.
#[derive(Debug)]
pub struct PatternBuffer {
    buffer: BytesMut,

    /// How many bytes from the end are searched.
    search_depth: usize,
}

impl PatternBuffer {
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
        }
    }

    /// Append channel data with escape sequences removed.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(&strip_ansi(data));
    }

    /// Find `pattern` in the last `search_depth` bytes.
    ///
    /// The returned range is relative to the whole buffer.
    pub fn search_tail(&self, pattern: &Regex) -> Option<Range<usize>> {
        let start = self.tail_start();
        pattern
            .find(&self.buffer[start..])
            .map(|m| (start + m.start())..(start + m.end()))
    }

    /// Whether `pattern` matches within the searched tail.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Cut a matched region (e.g. a `--More--` marker) out of the buffer.
    pub fn remove(&mut self, range: Range<usize>) {
        let tail = self.buffer.split_off(range.end);
        self.buffer.truncate(range.start);
        self.buffer.unsplit(tail);
    }

    /// Hand out everything read so far and start empty.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Current contents, invalid UTF-8 replaced.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn tail_start(&self) -> usize {
        self.buffer.len().saturating_sub(self.search_depth)
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
