// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher for the event-driven organizing mode

use notify::event::CreateKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::Result;

/// Events emitted by the watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A new file appeared
    FileCreated(PathBuf),
    /// An existing file was written to
    FileModified(PathBuf),
    /// Watcher error
    Error(String),
}

/// File system watcher
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Create a new file watcher
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();

        let config = Config::default().with_poll_interval(Duration::from_secs(2));

        let watcher = RecommendedWatcher::new(tx, config)?;

        Ok(Self {
            watcher,
            event_rx: rx,
        })
    }

    /// Watch a single directory, non-recursively.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", path);
        Ok(())
    }

    /// Get the next event (blocking with timeout)
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(event)) => Self::convert_event(event),
            Ok(Err(e)) => Some(WatchEvent::Error(e.to_string())),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => None,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Some(WatchEvent::Error("Watcher disconnected".to_string()))
            }
        }
    }

    /// Convert a notify event to our event type; directory events are dropped
    fn convert_event(event: Event) -> Option<WatchEvent> {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => None,
            EventKind::Create(_) => event
                .paths
                .first()
                .map(|p| WatchEvent::FileCreated(p.clone())),
            EventKind::Modify(_) => event
                .paths
                .first()
                .map(|p| WatchEvent::FileModified(p.clone())),
            _ => None,
        }
    }
}

/// Check if a file should be handled by the watcher at all.
///
/// Partial downloads, temp-prefixed names and OS droppings are ignored; a
/// later event for the finished name is handled normally.
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Hidden files and temp prefixes
    if filename.starts_with('.') || filename.starts_with('~') {
        return false;
    }

    // Partial download extensions
    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    let lowered = filename.to_lowercase();
    for ext in &temp_extensions {
        if lowered.ends_with(ext) {
            return false;
        }
    }

    // System files
    let skip_names = ["desktop.ini", "thumbs.db"];
    if skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n)) {
        return false;
    }

    true
}

/// Heuristic download-completion check.
///
/// The size is sampled twice, `interval` apart; the file counts as stable
/// when both samples agree and are non-zero. A file that trickles slowly or
/// pauses across the sampling boundary can be misjudged — accepted
/// limitation, the conflict-safe move keeps the damage bounded.
pub async fn is_stable(path: &Path, interval: Duration) -> bool {
    let first = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    tokio::time::sleep(interval).await;

    let second = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    first == second && first > 0
}

/// Paths currently being handled.
///
/// Suppresses duplicate concurrent processing when creation and modification
/// events overlap for one path. Mutex-guarded because handlers run as
/// spawned tasks; it is not a cross-path lock — distinct paths proceed
/// independently.
#[derive(Clone, Default)]
pub struct ProcessingSet {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ProcessingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a path for processing. Returns `None` when another handler
    /// already owns it; otherwise the guard releases the claim on drop, so
    /// the entry cannot leak even when the handler fails.
    pub fn claim(&self, path: &Path) -> Option<ProcessingGuard> {
        let mut set = self.inner.lock().expect("processing set poisoned");
        if set.insert(path.to_path_buf()) {
            Some(ProcessingGuard {
                set: Arc::clone(&self.inner),
                path: path.to_path_buf(),
            })
        } else {
            debug!("Already processing {:?}, skipping duplicate event", path);
            None
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("processing set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases a [`ProcessingSet`] claim on drop.
pub struct ProcessingGuard {
    set: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.path);
        }
    }
}
