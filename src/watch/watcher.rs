//! Live watching of one project root.
//!
//! A `ProjectWatcher` wires a watch backend, the per-path debouncer, and
//! the single-file reconciliation primitives together: raw events are
//! filtered against the watch and ignore globs, debounced per path, and
//! each settled event re-scans exactly one file and applies the result to
//! the catalog. Batch resync and live watching therefore mutate the
//! catalog through the same code path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use globset::GlobSet;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::catalog::{CatalogStore, DocumentChange, apply_file, apply_removal, now_iso_millis};
use crate::classify::{PatternClassifier, compile_set, is_hard_ignored, normalize_path};
use crate::config::DaemonConfig;
use crate::error::{ArgusError, Result};
use crate::project::Project;
use crate::scanner::{ScanOptions, scan_file};
use crate::watch::backend::{
    EventSource, NotifyBackend, PollBackend, RawEvent, RawEventKind, WatchBackend,
};
use crate::watch::debounce::DebounceMap;

/// Glob patterns watched when a project configures none.
pub const DEFAULT_WATCH_PATTERNS: &[&str] = &[
    "**/*.md",
    "**/*.markdown",
    "**/*.mdx",
    "**/*.txt",
    "**/*.rst",
    "**/*.adoc",
];

/// Tunables a watcher takes from the daemon configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    pub poll_watches: bool,
    pub poll_interval: Duration,
}

impl WatcherConfig {
    pub fn from_daemon(config: &DaemonConfig) -> Self {
        Self {
            debounce: config.debounce(),
            poll_watches: config.poll_watches,
            poll_interval: config.poll_interval(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from_daemon(&DaemonConfig::default())
    }
}

/// Notifications emitted by a running watcher.
#[derive(Debug, Clone)]
pub enum WatcherEvent {
    /// A settled change was applied to the catalog.
    Sync { path: String, change: DocumentChange },
    /// A settled change could not be applied.
    SyncError { path: String, message: String },
    /// The event source died. The orchestrator reacts by detaching the
    /// watcher and retrying with backoff.
    Fault { message: String },
}

/// Counters exposed by [`ProjectWatcher::stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatcherStats {
    /// Files passing the watch filters, counted at start and kept current
    /// as syncs land
    pub files_watched: u64,
    /// Settled events that reached the catalog
    pub events_processed: u64,
    /// Timestamp of the most recent processed event
    pub last_event_at: Option<String>,
}

struct RunningWatcher {
    source: EventSource,
    debounce: DebounceMap,
    task: JoinHandle<()>,
}

/// Watches one project root and applies settled changes to the catalog.
pub struct ProjectWatcher {
    project: Project,
    config: WatcherConfig,
    classifier: Arc<PatternClassifier>,
    options: ScanOptions,
    watch_set: Arc<GlobSet>,
    store: Arc<dyn CatalogStore>,
    events_tx: broadcast::Sender<WatcherEvent>,
    stats: Arc<Mutex<WatcherStats>>,
    inner: Mutex<Option<RunningWatcher>>,
}

impl ProjectWatcher {
    /// Build a watcher for `project`. Pattern problems surface here, not
    /// at start time.
    pub fn new(
        project: Project,
        store: Arc<dyn CatalogStore>,
        config: WatcherConfig,
    ) -> Result<Self> {
        let classifier = PatternClassifier::from_config(&project.patterns)?;
        let watch_patterns: Vec<String> = if project.patterns.watch.is_empty() {
            DEFAULT_WATCH_PATTERNS.iter().map(|p| p.to_string()).collect()
        } else {
            project.patterns.watch.clone()
        };
        let watch_set = compile_set(&watch_patterns)?;
        let options = ScanOptions {
            track_unknown: project.patterns.track_unknown,
        };
        let (events_tx, _) = broadcast::channel(64);

        Ok(Self {
            project,
            config,
            classifier: Arc::new(classifier),
            options,
            watch_set: Arc::new(watch_set),
            store,
            events_tx,
            stats: Arc::new(Mutex::new(WatcherStats::default())),
            inner: Mutex::new(None),
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_key(&self) -> &str {
        &self.project.key
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Subscribe to sync and fault notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WatcherEvent> {
        self.events_tx.subscribe()
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats.lock().clone()
    }

    /// Attach the backend and begin processing events.
    ///
    /// The ignore set is assembled fresh on every start: explicit ignore
    /// patterns plus whatever `.gitignore` currently holds.
    pub async fn start(&self) -> Result<()> {
        if self.inner.lock().is_some() {
            return Err(ArgusError::Watch(format!(
                "project '{}' is already being watched",
                self.project.key
            )));
        }
        let root = self.project.root.clone();
        if !root.is_dir() {
            return Err(ArgusError::Watch(format!(
                "project root {} is not a directory",
                root.display()
            )));
        }

        let ignore_set = Arc::new(self.ignore_set(&root).await?);

        let (raw_tx, mut raw_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut source: EventSource = if self.config.poll_watches {
            PollBackend::new(self.config.poll_interval).into()
        } else {
            NotifyBackend::new().into()
        };
        source.watch(&root, raw_tx)?;

        let (debounce, mut settled_rx) = DebounceMap::new(self.config.debounce);

        self.stats.lock().files_watched = count_watched(&root, &self.watch_set, &ignore_set);

        let ctx = SyncContext {
            key: self.project.key.clone(),
            root,
            project_id: self.project.id,
            classifier: Arc::clone(&self.classifier),
            options: self.options.clone(),
            store: Arc::clone(&self.store),
            events_tx: self.events_tx.clone(),
            stats: Arc::clone(&self.stats),
        };
        let watch_set = Arc::clone(&self.watch_set);
        let loop_debounce = debounce.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    raw = raw_rx.recv() => match raw {
                        Some(event) => {
                            if accepts(&ctx.root, &event.path, &watch_set, &ignore_set) {
                                loop_debounce.schedule(event);
                            }
                        }
                        None => {
                            tracing::warn!(
                                "event source for project '{}' closed unexpectedly",
                                ctx.key
                            );
                            let _ = ctx.events_tx.send(WatcherEvent::Fault {
                                message: "event source closed unexpectedly".to_string(),
                            });
                            return;
                        }
                    },
                    settled = settled_rx.recv() => match settled {
                        Some(event) => ctx.process(event).await,
                        None => return,
                    },
                }
            }
        });

        let mut inner = self.inner.lock();
        if inner.is_some() {
            // Lost a start race; roll this attempt back.
            source.close();
            debounce.cancel_all();
            task.abort();
            return Err(ArgusError::Watch(format!(
                "project '{}' is already being watched",
                self.project.key
            )));
        }
        *inner = Some(RunningWatcher {
            source,
            debounce,
            task,
        });
        tracing::info!("watching project '{}'", self.project.key);
        Ok(())
    }

    /// Detach the backend and cancel all pending work.
    ///
    /// The event loop is torn down first and awaited, so once this
    /// returns nothing can settle late or emit another event.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut running) = self.inner.lock().take() else {
            return Ok(());
        };

        running.task.abort();
        running.debounce.cancel_all();
        running.source.close();

        match running.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                return Err(ArgusError::Watch(format!(
                    "watcher loop for '{}' panicked: {e}",
                    self.project.key
                )));
            }
        }
        tracing::info!("stopped watching project '{}'", self.project.key);
        Ok(())
    }

    /// Explicit ignore patterns plus the project's `.gitignore`, translated.
    /// A broken line in someone's `.gitignore` must not take the watcher
    /// down, so untranslatable patterns are dropped with a warning.
    async fn ignore_set(&self, root: &Path) -> Result<GlobSet> {
        let mut patterns = self.project.patterns.ignore.clone();
        match tokio::fs::read_to_string(root.join(".gitignore")).await {
            Ok(content) => {
                for pattern in translate_gitignore(&content) {
                    if compile_set(std::slice::from_ref(&pattern)).is_ok() {
                        patterns.push(pattern);
                    } else {
                        tracing::warn!("skipping untranslatable .gitignore pattern {pattern:?}");
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("could not read .gitignore under {}: {e}", root.display());
            }
        }
        compile_set(&patterns)
    }
}

/// Everything the event-loop task needs to turn a settled event into a
/// catalog mutation.
struct SyncContext {
    key: String,
    root: PathBuf,
    project_id: i64,
    classifier: Arc<PatternClassifier>,
    options: ScanOptions,
    store: Arc<dyn CatalogStore>,
    events_tx: broadcast::Sender<WatcherEvent>,
    stats: Arc<Mutex<WatcherStats>>,
}

impl SyncContext {
    async fn process(&self, event: RawEvent) {
        let Ok(rel) = event.path.strip_prefix(&self.root) else {
            return;
        };
        let rel = rel.to_path_buf();
        let rel_str = normalize_path(&rel);

        match event.kind {
            RawEventKind::Changed => {
                match scan_file(&self.root, &rel, &self.classifier, &self.options) {
                    Ok(Some(info)) => {
                        match apply_file(self.store.as_ref(), self.project_id, &info).await {
                            Ok(change) => self.record_sync(rel_str, change),
                            Err(e) => self.record_error(rel_str, e),
                        }
                    }
                    // Denied or untracked under current policy.
                    Ok(None) => {}
                    Err(ArgusError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                        // Gone again between settling and reading.
                        self.remove(rel_str).await;
                    }
                    Err(e) => self.record_error(rel_str, e),
                }
            }
            RawEventKind::Removed => self.remove(rel_str).await,
        }
    }

    async fn remove(&self, rel_str: String) {
        match apply_removal(self.store.as_ref(), self.project_id, &rel_str).await {
            Ok(true) => self.record_sync(rel_str, DocumentChange::Removed),
            // Nothing live at that path.
            Ok(false) => {}
            Err(e) => self.record_error(rel_str, e),
        }
    }

    fn record_sync(&self, path: String, change: DocumentChange) {
        {
            let mut stats = self.stats.lock();
            stats.events_processed += 1;
            stats.last_event_at = Some(now_iso_millis());
            match change {
                DocumentChange::Added => stats.files_watched += 1,
                DocumentChange::Removed => {
                    stats.files_watched = stats.files_watched.saturating_sub(1);
                }
                _ => {}
            }
        }
        tracing::debug!("synced {path} ({change:?}) in project '{}'", self.key);
        let _ = self.events_tx.send(WatcherEvent::Sync { path, change });
    }

    fn record_error(&self, path: String, error: ArgusError) {
        tracing::warn!("failed to sync {path} in project '{}': {error}", self.key);
        let _ = self.events_tx.send(WatcherEvent::SyncError {
            path,
            message: error.to_string(),
        });
    }
}

/// Raw-event admission filter: inside the root, not hard-ignored, not in
/// the ignore set, and matching the watch set.
fn accepts(root: &Path, abs: &Path, watch_set: &GlobSet, ignore_set: &GlobSet) -> bool {
    let Ok(rel) = abs.strip_prefix(root) else {
        return false;
    };
    if rel.as_os_str().is_empty() || is_hard_ignored(rel) {
        return false;
    }
    let normalized = normalize_path(rel);
    !ignore_set.is_match(&normalized) && watch_set.is_match(&normalized)
}

/// Count files that pass the watch filters right now.
fn count_watched(root: &Path, watch_set: &GlobSet, ignore_set: &GlobSet) -> u64 {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => !is_hard_ignored(rel),
            _ => true,
        }
    });
    let mut count = 0;
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_file() && accepts(root, entry.path(), watch_set, ignore_set) {
            count += 1;
        }
    }
    count
}

/// Translate `.gitignore` lines into the glob dialect used for ignore
/// matching: leading `/` is stripped, a bare name is anchored anywhere as
/// `**/name`, and a trailing `/` (directory rule) becomes `/**`. Negated
/// entries are not supported and are dropped.
pub fn translate_gitignore(content: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let mut entry = line.trim_start_matches('/');
        let is_dir = entry.ends_with('/');
        if is_dir {
            entry = entry.trim_end_matches('/');
        }
        if entry.is_empty() {
            continue;
        }
        let mut pattern = if entry.contains('/') {
            entry.to_string()
        } else {
            format!("**/{entry}")
        };
        if is_dir {
            pattern.push_str("/**");
        }
        patterns.push(pattern);
    }
    patterns
}
