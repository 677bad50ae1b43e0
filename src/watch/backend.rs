//! Pluggable sources of raw filesystem change events.
//!
//! `NotifyBackend` wraps `notify::RecommendedWatcher` and bridges its
//! callback into a tokio channel. `PollBackend` diffs mtime/size snapshots
//! on an interval, for filesystems where native notification is unreliable
//! (network mounts, some container overlays). Both fold the platform event
//! taxonomy down to `Changed`/`Removed`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use enum_dispatch::enum_dispatch;
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::classify::is_hard_ignored;
use crate::error::{ArgusError, Result};

/// Simplified change kind surfaced by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// File created or its content modified.
    Changed,
    /// File removed.
    Removed,
}

/// One raw change notification for one absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawEventKind,
}

/// A source of raw change events for one project root.
#[enum_dispatch]
pub trait WatchBackend {
    /// Begin watching `root` recursively, delivering events into `tx`.
    fn watch(&mut self, root: &Path, tx: UnboundedSender<RawEvent>) -> Result<()>;

    /// Stop producing events and release any OS resources.
    fn close(&mut self);
}

/// The closed set of backends a watcher can run on.
#[enum_dispatch(WatchBackend)]
pub enum EventSource {
    Notify(NotifyBackend),
    Poll(PollBackend),
}

/// Collapse notify's event taxonomy to the two kinds the sync path
/// distinguishes. Access and other metadata-only events are dropped.
fn fold_event_kind(kind: EventKind) -> Option<RawEventKind> {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(RawEventKind::Changed),
        EventKind::Remove(_) => Some(RawEventKind::Removed),
        _ => None,
    }
}

/// Native OS change notifications via `notify`.
#[derive(Default)]
pub struct NotifyBackend {
    /// Handle to the underlying `notify` watcher. Never read directly, but
    /// it **must** be kept alive: dropping the `RecommendedWatcher`
    /// deregisters the OS file-watch and stops all event delivery.
    watcher: Option<notify::RecommendedWatcher>,
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, root: &Path, tx: UnboundedSender<RawEvent>) -> Result<()> {
        // Bridge the notify callback (which runs on notify's own thread)
        // into the tokio channel. Send failures mean the consumer is gone,
        // which is normal during shutdown.
        let mut watcher = notify::RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(kind) = fold_event_kind(event.kind) {
                        for path in event.paths {
                            let _ = tx.send(RawEvent { path, kind });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("filesystem notification error: {e}");
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);
        Ok(())
    }

    fn close(&mut self) {
        self.watcher = None;
    }
}

type PollSnapshot = HashMap<PathBuf, (SystemTime, u64)>;

/// Interval-based fallback backend: walks the tree, records (mtime, size)
/// per file, and reports paths whose stamp changed since the last walk.
pub struct PollBackend {
    interval: Duration,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollBackend {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

impl WatchBackend for PollBackend {
    fn watch(&mut self, root: &Path, tx: UnboundedSender<RawEvent>) -> Result<()> {
        if !root.is_dir() {
            return Err(ArgusError::Watch(format!(
                "cannot poll {}: not a directory",
                root.display()
            )));
        }
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let root = root.to_path_buf();
        let task = tokio::spawn(async move {
            let mut previous = take_snapshot(&root);
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                let current = take_snapshot(&root);
                for event in diff_snapshots(&previous, &current) {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                previous = current;
            }
        });
        self.task = Some(task);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Walk `root` and record (mtime, size) for every regular file, skipping
/// hard-ignored directories entirely. Unreadable entries are left out; the
/// next walk picks them up if they become readable.
fn take_snapshot(root: &Path) -> PollSnapshot {
    let mut seen = PollSnapshot::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => !is_hard_ignored(rel),
            _ => true,
        }
    });
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            seen.insert(entry.into_path(), (mtime, meta.len()));
        }
    }
    seen
}

fn diff_snapshots(previous: &PollSnapshot, current: &PollSnapshot) -> Vec<RawEvent> {
    let mut events = Vec::new();
    for (path, stamp) in current {
        match previous.get(path) {
            Some(old) if old == stamp => {}
            _ => events.push(RawEvent {
                path: path.clone(),
                kind: RawEventKind::Changed,
            }),
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push(RawEvent {
                path: path.clone(),
                kind: RawEventKind::Removed,
            });
        }
    }
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}
