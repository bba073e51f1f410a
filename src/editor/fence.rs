//! Fenced code block detection
//!
//! Single forward pass over the buffer. A line starting with three backticks
//! opens a region; the next line starting with three backticks closes it.
//! Nested fences are not recognized, and an unterminated fence runs to the
//! end of the buffer.

use crate::editor::buffer::LineSource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Opening fence with an optional language tag (the first info word)
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```([^\s`]+)?").expect("valid fence regex"));

/// Closing fence marker
pub const FENCE: &str = "```";

/// Language tag on an opening fence line, with its character span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceTag {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A fenced code block in the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedRegion {
    /// Line holding the opening fence
    pub open_line: usize,
    /// Content lines, excluding both fence lines
    pub content: Range<usize>,
    /// Line holding the closing fence, `None` when unterminated
    pub close_line: Option<usize>,
    pub tag: Option<FenceTag>,
    /// Grammar used for the content, filled in by the decorator
    pub grammar_id: Option<String>,
}

impl FencedRegion {
    pub fn is_terminated(&self) -> bool {
        self.close_line.is_some()
    }
}

/// Parse an opening fence line
pub fn parse_open_fence(line: &str) -> Option<Option<FenceTag>> {
    let caps = FENCE_OPEN.captures(line)?;
    Some(caps.get(1).map(|m| {
        let start = line[..m.start()].chars().count();
        FenceTag {
            text: m.as_str().to_string(),
            start,
            end: start + m.as_str().chars().count(),
        }
    }))
}

/// Find every fenced region, top to bottom
pub fn scan_fences<S: LineSource + ?Sized>(source: &S) -> Vec<FencedRegion> {
    let total = source.line_count();
    let mut regions = Vec::new();
    let mut line = 0;

    while line < total {
        let text = source.line_text(line).unwrap_or_default();
        let Some(tag) = parse_open_fence(&text) else {
            line += 1;
            continue;
        };

        let mut end = line + 1;
        while end < total
            && !source
                .line_text(end)
                .map_or(false, |l| l.starts_with(FENCE))
        {
            end += 1;
        }

        regions.push(FencedRegion {
            open_line: line,
            content: line + 1..end,
            close_line: (end < total).then_some(end),
            tag,
            grammar_id: None,
        });

        line = end + 1;
    }

    regions
}
