//! File system watcher for the document being rendered
//!
//! Watches the parent directory of a single file so that editors replacing
//! the file on save are still seen. Bursts of events collapse into one
//! change notification after the debounce window.

use crate::error::WatcherError;
use crate::utils::Debouncer;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce interval in milliseconds
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

/// Watches one file for modifications
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
    target: PathBuf,
    debouncer: Debouncer,
}

impl FileWatcher {
    /// Start watching `path`
    pub fn new(path: impl AsRef<Path>, config: WatcherConfig) -> Result<Self, WatcherError> {
        let target = path.as_ref().canonicalize().map_err(|e| {
            WatcherError::InitError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| WatcherError::InitError(format!("{} has no parent", target.display())))?;

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| WatcherError::InitError(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::WatchError {
                path: dir.clone(),
                source,
            })?;

        log::debug!("Watching {}", target.display());
        Ok(Self {
            _watcher: watcher,
            event_rx: rx,
            target,
            debouncer: Debouncer::new(config.debounce_ms),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Drain queued events; true once per burst after the quiet period
    pub fn poll(&mut self) -> bool {
        while let Ok(res) = self.event_rx.try_recv() {
            self.record(res);
        }
        self.debouncer.poll_due()
    }

    fn record(&mut self, res: notify::Result<Event>) {
        match res {
            Ok(event) if is_relevant(&event, &self.target) => self.debouncer.trigger(),
            Ok(_) => {}
            Err(e) => log::warn!("File watcher error: {}", e),
        }
    }
}

/// Whether a notify event touches `target` with a content change
pub fn is_relevant(event: &Event, target: &Path) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches && event.paths.iter().any(|p| p == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_relevant_events() {
        let target = PathBuf::from("/docs/readme.md");
        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(target.clone());
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(target.clone());
        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/docs/other.md"));
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(target.clone());

        assert!(is_relevant(&modify, &target));
        assert!(is_relevant(&create, &target));
        assert!(!is_relevant(&other, &target));
        assert!(!is_relevant(&access, &target));
    }

    #[test]
    fn test_missing_file_fails_to_watch() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileWatcher::new(dir.path().join("absent.md"), WatcherConfig::default());
        assert!(matches!(result, Err(WatcherError::InitError(_))));
    }

    #[test]
    fn test_watch_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Doc").unwrap();

        let mut watcher = FileWatcher::new(&path, WatcherConfig { debounce_ms: 10 }).unwrap();
        assert_eq!(watcher.target(), path.canonicalize().unwrap());
        assert!(!watcher.poll());
    }
}
