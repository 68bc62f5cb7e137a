//! Think/answer segmentation of streamed model output.
//!
//! Reasoning models wrap their internal reasoning in marker tags
//! (`<think>...</think>`). The splitter always works on the whole
//! accumulated buffer, so a marker split across two fragments is found as
//! soon as its last byte arrives.

use anyhow::{anyhow, Result};

pub const DEFAULT_OPEN_MARKER: &str = "<think>";
pub const DEFAULT_CLOSE_MARKER: &str = "</think>";

/// The pair of tags delimiting a thinking region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    open: String,
    close: String,
}

impl Markers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let open = open.into();
        let close = close.into();
        if open.is_empty() || close.is_empty() {
            return Err(anyhow!("thinking markers must not be empty"));
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_MARKER.to_string(),
            close: DEFAULT_CLOSE_MARKER.to_string(),
        }
    }
}

/// Result of splitting a raw buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Visible answer text, every segment outside the markers in order.
    pub content: String,
    /// Every thinking segment in order, markers removed.
    pub thinking: String,
    /// True when the buffer ends inside an unclosed thinking region.
    pub in_thinking: bool,
}

/// Split `buffer` into visible content and thinking text.
///
/// An open marker inside a thinking region is thinking text, and a close
/// marker with no region open is content text.
pub fn split_thinking(buffer: &str, markers: &Markers) -> Split {
    let mut split = Split::default();
    let mut rest = buffer;

    loop {
        let Some(start) = rest.find(markers.open()) else {
            split.content.push_str(rest);
            break;
        };
        split.content.push_str(&rest[..start]);

        let inside = &rest[start + markers.open().len()..];
        match inside.find(markers.close()) {
            Some(end) => {
                split.thinking.push_str(&inside[..end]);
                rest = &inside[end + markers.close().len()..];
            }
            None => {
                // Still generating the reasoning
                split.thinking.push_str(inside);
                split.in_thinking = true;
                break;
            }
        }
    }

    split
}
