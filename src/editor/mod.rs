//! Editor module for md2pdf studio
//!
//! Contains the source-side editing support:
//! - Text buffer management (using ropey)
//! - Fenced code block scanning
//! - Syntax decorations over fenced code

pub mod buffer;
pub mod decoration;
pub mod fence;

pub use buffer::{LineSource, TextBuffer};
pub use decoration::{line_marks, HighlightMark, MarkLayer, MarkTarget, TokenDecorator, LANG_CLASS};
pub use fence::{parse_open_fence, scan_fences, FenceTag, FencedRegion};
