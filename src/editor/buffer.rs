//! Line-addressed text buffer
//!
//! [`LineSource`] is the contract the fence scanner and the decorator read
//! through; [`TextBuffer`] is the rope-backed implementation the session
//! edits.

use ropey::Rope;
use std::ops::Range;

/// Read access to a buffer by line
pub trait LineSource {
    fn line_count(&self) -> usize;

    /// Line text without its line terminator
    fn line_text(&self, line: usize) -> Option<String>;
}

impl LineSource for [&str] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.get(line).map(|s| s.to_string())
    }
}

impl LineSource for Vec<String> {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.get(line).cloned()
    }
}

/// Text buffer wrapping ropey::Rope with a change counter
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    rope: Rope,

    /// Incremented on each change
    version: u64,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer from a string; CRLF line endings are normalized to LF
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(&text.replace("\r\n", "\n")),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Line count; an empty buffer has one empty line
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Get a line without the trailing newline
    pub fn line_without_newline(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(line_idx).to_string();
        Some(
            line.trim_end_matches('\n')
                .trim_end_matches('\r')
                .to_string(),
        )
    }

    /// Convert (line, column) to character offset, clamping the column
    pub fn line_col_to_char(&self, line: usize, col: usize) -> Option<usize> {
        let line_len = self.line_without_newline(line)?.chars().count();
        Some(self.rope.line_to_char(line) + col.min(line_len))
    }

    /// Convert character offset to (line, column)
    pub fn char_to_line_col(&self, char_idx: usize) -> (usize, usize) {
        let char_idx = char_idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(char_idx);
        (line, char_idx - self.rope.line_to_char(line))
    }

    /// Insert text at character position
    pub fn insert(&mut self, char_idx: usize, text: &str) {
        let idx = char_idx.min(self.rope.len_chars());
        self.rope.insert(idx, &text.replace("\r\n", "\n"));
        self.version += 1;
    }

    /// Insert text at (line, column), or at the end if the line is out of range
    pub fn insert_at(&mut self, line: usize, col: usize, text: &str) {
        let idx = self
            .line_col_to_char(line, col)
            .unwrap_or(self.rope.len_chars());
        self.insert(idx, text);
    }

    /// Delete a range of characters
    pub fn delete(&mut self, range: Range<usize>) {
        let start = range.start.min(self.rope.len_chars());
        let end = range.end.min(self.rope.len_chars());
        if start < end {
            self.rope.remove(start..end);
            self.version += 1;
        }
    }

    /// Replace a range of characters
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        self.delete(range.clone());
        self.insert(range.start, text);
    }

    /// Replace the entire contents
    pub fn set_content(&mut self, text: &str) {
        self.rope = Rope::from_str(&text.replace("\r\n", "\n"));
        self.version += 1;
    }

    /// The entire buffer contents
    pub fn text(&self) -> String {
        self.rope.to_string()
    }
}

impl LineSource for TextBuffer {
    fn line_count(&self) -> usize {
        self.len_lines()
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.line_without_newline(line)
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buf = TextBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len_lines(), 1);
        assert_eq!(buf.line_text(0), Some(String::new()));
    }

    #[test]
    fn test_crlf_normalized() {
        let buf = TextBuffer::from_text("Hello\r\nWorld");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.line_text(0), Some("Hello".to_string()));
        assert_eq!(buf.text(), "Hello\nWorld");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut buf = TextBuffer::from_text("Hello World");
        buf.insert(5, ",");
        assert_eq!(buf.text(), "Hello, World");
        buf.delete(5..7);
        assert_eq!(buf.text(), "HelloWorld");
        buf.replace(0..5, "Howdy ");
        assert_eq!(buf.text(), "Howdy World");
    }

    #[test]
    fn test_line_col_conversion() {
        let buf = TextBuffer::from_text("Line 1\nLine 2\nLine 3");
        assert_eq!(buf.line_col_to_char(1, 0), Some(7));
        assert_eq!(buf.line_col_to_char(1, 99), Some(13));
        assert_eq!(buf.line_col_to_char(9, 0), None);
        assert_eq!(buf.char_to_line_col(11), (1, 4));
    }

    #[test]
    fn test_version_increments() {
        let mut buf = TextBuffer::new();
        buf.insert_at(0, 0, "test");
        buf.delete(0..2);
        buf.delete(5..9);
        assert_eq!(buf.version(), 2);
        buf.set_content("new");
        assert_eq!(buf.version(), 3);
    }

    #[test]
    fn test_slice_line_source() {
        let lines: &[&str] = &["a", "b"];
        assert_eq!(lines.line_count(), 2);
        assert_eq!(lines.line_text(1), Some("b".to_string()));
        assert_eq!(lines.line_text(2), None);
    }
}
