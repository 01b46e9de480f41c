//! Sentinel line-number annotation.
//!
//! For every line containing the sentinel token, the first occurrence is
//! replaced by the 1-based number of the line that follows it. The rest of
//! the line, and every line without the sentinel, is copied verbatim. Input
//! is treated as raw bytes, so text in any encoding passes through.

use regex::bytes::Regex;

use crate::errors::{HarnessError, HarnessResult};

pub const DEFAULT_SENTINEL: &str = "__LINE__";

/// Rewrites sentinel tokens in a byte buffer.
#[derive(Debug, Clone)]
pub struct Annotator {
    sentinel: Option<Regex>,
}

impl Annotator {
    pub fn new(sentinel: &str) -> HarnessResult<Self> {
        if sentinel.is_empty() {
            return Ok(Self { sentinel: None });
        }
        let re = Regex::new(&regex::escape(sentinel))
            .map_err(|e| HarnessError::config(format!("invalid sentinel '{sentinel}': {e}")))?;
        Ok(Self { sentinel: Some(re) })
    }

    pub fn apply(&self, text: &[u8]) -> Vec<u8> {
        let Some(re) = &self.sentinel else {
            return text.to_vec();
        };
        let mut out = Vec::with_capacity(text.len());
        for (index, line) in text.split_inclusive(|b| *b == b'\n').enumerate() {
            match re.find(line) {
                Some(m) => {
                    out.extend_from_slice(&line[..m.start()]);
                    out.extend_from_slice((index + 2).to_string().as_bytes());
                    out.extend_from_slice(&line[m.end()..]);
                }
                None => out.extend_from_slice(line),
            }
        }
        out
    }
}

/// Convenience wrapper for UTF-8 text.
pub fn annotate(text: &str, sentinel: &str) -> HarnessResult<String> {
    let bytes = Annotator::new(sentinel)?.apply(text.as_bytes());
    // Replacements are ASCII digits at token boundaries, so valid UTF-8 stays valid.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
