//! Utilities module for md2pdf studio
//!
//! Shared helper functions and utilities including:
//! - Debouncing
//! - Path and extension helpers

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Trailing-edge debounce: a burst of triggers fires once, after the delay
/// has passed without a new trigger
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            last_trigger: None,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Record a trigger, restarting the quiet period
    pub fn trigger(&mut self) {
        self.trigger_at(Instant::now());
    }

    pub fn trigger_at(&mut self, now: Instant) {
        self.last_trigger = Some(now);
    }

    /// Whether a burst is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.last_trigger.is_some()
    }

    /// Time left until the pending burst fires
    pub fn remaining(&self) -> Option<Duration> {
        let last = self.last_trigger?;
        Some(self.delay().saturating_sub(last.elapsed()))
    }

    /// Returns true once per burst when the quiet period has passed
    pub fn poll_due(&mut self) -> bool {
        self.poll_due_at(Instant::now())
    }

    pub fn poll_due_at(&mut self, now: Instant) -> bool {
        match self.last_trigger {
            Some(last) if now.duration_since(last) >= self.delay() => {
                self.last_trigger = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending burst
    pub fn reset(&mut self) {
        self.last_trigger = None;
    }
}

/// Path utilities
pub mod path {
    use super::*;

    /// Extensions accepted as Markdown or plain text sources
    pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "txt"];

    /// Get the lowercased file extension
    pub fn extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
    }

    /// Lowercased extension of a bare file name or URL path segment
    pub fn name_extension(name: &str) -> Option<String> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.contains('/') {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Check if a file name has a Markdown or text extension
    pub fn is_markdown_name(name: &str) -> bool {
        name_extension(name)
            .map(|ext| MARKDOWN_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Check if path has a Markdown or text extension
    pub fn is_markdown(path: &Path) -> bool {
        extension(path)
            .map(|ext| MARKDOWN_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Expand tilde to home directory
    pub fn expand_tilde(path: &Path) -> PathBuf {
        if let Ok(stripped) = path.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_fires_once_per_burst() {
        let mut debouncer = Debouncer::new(50);
        let start = Instant::now();
        assert!(!debouncer.poll_due_at(start));

        debouncer.trigger_at(start);
        debouncer.trigger_at(start + Duration::from_millis(30));
        assert!(!debouncer.poll_due_at(start + Duration::from_millis(60)));
        assert!(debouncer.poll_due_at(start + Duration::from_millis(80)));
        assert!(!debouncer.poll_due_at(start + Duration::from_millis(200)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_reset() {
        let mut debouncer = Debouncer::new(0);
        debouncer.trigger();
        debouncer.reset();
        assert!(!debouncer.poll_due());
        assert_eq!(debouncer.remaining(), None);
    }

    #[test]
    fn test_is_markdown() {
        assert!(path::is_markdown(Path::new("test.md")));
        assert!(path::is_markdown(Path::new("NOTES.Markdown")));
        assert!(path::is_markdown(Path::new("readme.txt")));
        assert!(!path::is_markdown(Path::new("test.rs")));
        assert!(!path::is_markdown(Path::new("md")));
    }

    #[test]
    fn test_name_extension() {
        assert_eq!(path::name_extension("a.MD"), Some("md".to_string()));
        assert_eq!(path::name_extension(".md"), None);
        assert_eq!(path::name_extension("dir.v2/file"), None);
        assert!(path::is_markdown_name("guide.mdown"));
        assert!(!path::is_markdown_name("photo.png"));
    }
}
