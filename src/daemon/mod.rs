//! Daemon orchestration: one watcher per valid project, retry with
//! backoff on watcher failure, sequential full resyncs, and aggregate
//! status.

pub mod status;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::catalog::{CatalogStore, CategoryCounts, DocumentChange, SyncReport, reconcile};
use crate::classify::PatternClassifier;
use crate::config::DaemonConfig;
use crate::error::{ArgusError, Result};
use crate::project::{Project, ProjectRegistry};
use crate::scanner::{ScanOptions, scan};
use crate::watch::{ProjectWatcher, WatcherConfig, WatcherEvent};

pub use status::{DaemonStatus, ProjectStatus};

/// Watcher events tagged with their project key, plus orchestrator
/// lifecycle notifications, on one broadcast channel.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    Sync {
        project: String,
        path: String,
        change: DocumentChange,
    },
    SyncError {
        project: String,
        path: String,
        message: String,
    },
    /// A watcher failed; a reattach is scheduled after `delay_ms`.
    WatcherRestarting {
        project: String,
        attempt: u32,
        delay_ms: u64,
    },
    /// A watcher exhausted its retries and stays detached for the rest
    /// of the process lifetime.
    WatcherDisabled { project: String },
    ResyncCompleted {
        project: String,
        report: SyncReport,
    },
}

struct WatcherHandle {
    watcher: Arc<ProjectWatcher>,
    forward: JoinHandle<()>,
}

/// Owns the watchers for every valid registered project.
///
/// This is a cheap clonable handle; clones share one orchestrator.
/// Constructed once at process start and passed to whatever needs it,
/// so tests can run independent instances side by side.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: ProjectRegistry,
    store: Arc<dyn CatalogStore>,
    config: DaemonConfig,
    events_tx: broadcast::Sender<DaemonEvent>,
    watchers: Mutex<HashMap<String, WatcherHandle>>,
    retries: Mutex<HashMap<String, u32>>,
    disabled: Mutex<HashSet<String>>,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(registry: ProjectRegistry, store: Arc<dyn CatalogStore>) -> Self {
        let config = registry.daemon.clone();
        let (events_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                config,
                events_tx,
                watchers: Mutex::new(HashMap::new()),
                retries: Mutex::new(HashMap::new()),
                disabled: Mutex::new(HashSet::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        Arc::clone(&self.inner.store)
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.inner.registry
    }

    /// Bring the daemon up: an initial full resync per valid project,
    /// then a live watcher for each.
    ///
    /// Watcher start failures do not fail daemon startup; they enter
    /// the retry path and surface as `WatcherRestarting` and
    /// `WatcherDisabled` events. Resync failures do propagate.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("daemon orchestrator already running");
            return Ok(());
        }

        let projects = self.inner.registry.valid_projects();
        tracing::info!(
            "daemon starting: {} valid of {} registered project(s)",
            projects.len(),
            self.inner.registry.len()
        );
        for project in projects {
            self.resync(&project).await?;
            self.attach(project).await;
        }
        Ok(())
    }

    /// Stop every watcher best-effort and clear all orchestrator state.
    ///
    /// Per-watcher stop errors are logged, never propagated. Backoff
    /// timers still in flight observe the cleared running flag and do
    /// not resurrect their watcher.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        let handles: Vec<WatcherHandle> = {
            let mut watchers = self.inner.watchers.lock();
            watchers.drain().map(|(_, handle)| handle).collect()
        };

        let stops = handles.iter().map(|handle| handle.watcher.stop());
        for (handle, result) in handles.iter().zip(join_all(stops).await) {
            if let Err(e) = result {
                tracing::warn!(
                    "failed to stop watcher for '{}': {e}",
                    handle.watcher.project_key()
                );
            }
        }
        for handle in &handles {
            handle.forward.abort();
        }

        self.inner.retries.lock().clear();
        self.inner.disabled.lock().clear();
        tracing::info!("daemon stopped");
    }

    /// Full scan+reconcile for every valid project, one at a time to
    /// bound file descriptors and memory.
    pub async fn resync_all(&self) -> Result<Vec<(String, SyncReport)>> {
        let mut reports = Vec::new();
        for project in self.inner.registry.valid_projects() {
            let report = self.resync(&project).await?;
            reports.push((project.key, report));
        }
        Ok(reports)
    }

    /// Full scan+reconcile for one project by key.
    pub async fn resync_project(&self, key: &str) -> Result<SyncReport> {
        let project = self
            .inner
            .registry
            .get(key)
            .ok_or_else(|| ArgusError::ProjectNotFound(key.to_string()))?
            .clone();
        if !project.is_valid() {
            return Err(ArgusError::ProjectInvalid(
                key.to_string(),
                "root or marker directory missing".to_string(),
            ));
        }
        self.resync(&project).await
    }

    /// Validity, watcher attachment, and stats for every registered
    /// project, valid or not, plus per-category document totals over
    /// the projects with an attached watcher.
    pub async fn status(&self) -> Result<DaemonStatus> {
        let mut projects = Vec::new();
        let mut totals = CategoryCounts::default();

        for project in self.inner.registry.projects() {
            let stats = {
                let watchers = self.inner.watchers.lock();
                watchers.get(&project.key).map(|h| h.watcher.stats())
            };
            let watching = stats.is_some();
            if watching {
                totals.merge(&self.inner.store.category_counts(project.id).await?);
            }
            projects.push(ProjectStatus {
                key: project.key.clone(),
                root: project.root.display().to_string(),
                valid: project.is_valid(),
                watching,
                disabled: self.inner.disabled.lock().contains(&project.key),
                stats,
            });
        }

        Ok(DaemonStatus {
            running: self.is_running(),
            projects,
            totals,
        })
    }

    async fn resync(&self, project: &Project) -> Result<SyncReport> {
        let classifier = PatternClassifier::from_config(&project.patterns)?;
        let options = ScanOptions {
            track_unknown: project.patterns.track_unknown,
        };
        let files = scan(&project.root, &classifier, &options)?;
        let report = reconcile(self.inner.store.as_ref(), project.id, &files).await?;
        tracing::info!(
            "resynced '{}': {} files ({} new, {} modified, {} deleted)",
            project.key,
            report.total,
            report.new,
            report.modified,
            report.deleted
        );
        let _ = self.inner.events_tx.send(DaemonEvent::ResyncCompleted {
            project: project.key.clone(),
            report,
        });
        Ok(report)
    }

    /// Construct and start one project's watcher, wiring its events
    /// into the daemon channel. Failures enter the backoff path
    /// instead of propagating.
    async fn attach(&self, project: Project) {
        let key = project.key.clone();
        if !self.inner.running.load(Ordering::SeqCst)
            || self.inner.disabled.lock().contains(&key)
            || self.inner.watchers.lock().contains_key(&key)
        {
            return;
        }

        let watcher = match ProjectWatcher::new(
            project.clone(),
            Arc::clone(&self.inner.store),
            WatcherConfig::from_daemon(&self.inner.config),
        ) {
            Ok(watcher) => Arc::new(watcher),
            Err(e) => {
                tracing::warn!("cannot build watcher for '{key}': {e}");
                self.schedule_retry(project);
                return;
            }
        };

        match watcher.start().await {
            Ok(()) => {
                self.inner.retries.lock().remove(&key);
                let forward = self.spawn_forwarder(&watcher, project);
                self.inner
                    .watchers
                    .lock()
                    .insert(key, WatcherHandle { watcher, forward });
            }
            Err(e) => {
                tracing::warn!("failed to start watcher for '{key}': {e}");
                self.schedule_retry(project);
            }
        }
    }

    /// Count the failure and either schedule a delayed reattach or give
    /// the project up for the rest of the process lifetime.
    fn schedule_retry(&self, project: Project) {
        let key = project.key.clone();
        let attempt = {
            let mut retries = self.inner.retries.lock();
            let count = retries.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if attempt >= self.inner.config.max_watcher_retries {
            tracing::error!("giving up on '{key}' after {attempt} failed watcher attempts");
            self.inner.disabled.lock().insert(key.clone());
            let _ = self
                .inner
                .events_tx
                .send(DaemonEvent::WatcherDisabled { project: key });
            return;
        }

        let delay = self.inner.config.initial_backoff() * 2u32.pow(attempt - 1);
        tracing::warn!("watcher for '{key}' failed (attempt {attempt}); retrying in {delay:?}");
        let _ = self.inner.events_tx.send(DaemonEvent::WatcherRestarting {
            project: key,
            attempt,
            delay_ms: delay.as_millis() as u64,
        });

        let orchestrator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // An intentional stop() must not be resurrected by a
            // lingering retry timer.
            if !orchestrator.inner.running.load(Ordering::SeqCst) {
                return;
            }
            orchestrator.attach(project).await;
        });
    }

    fn spawn_forwarder(&self, watcher: &Arc<ProjectWatcher>, project: Project) -> JoinHandle<()> {
        let mut rx = watcher.subscribe();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(WatcherEvent::Sync { path, change }) => {
                        let _ = orchestrator.inner.events_tx.send(DaemonEvent::Sync {
                            project: project.key.clone(),
                            path,
                            change,
                        });
                    }
                    Ok(WatcherEvent::SyncError { path, message }) => {
                        let _ = orchestrator.inner.events_tx.send(DaemonEvent::SyncError {
                            project: project.key.clone(),
                            path,
                            message,
                        });
                    }
                    Ok(WatcherEvent::Fault { message }) => {
                        tracing::warn!("watcher fault in '{}': {message}", project.key);
                        let Some(handle) = orchestrator.take_watcher(&project.key) else {
                            // stop() won the race and owns shutdown.
                            return;
                        };
                        if let Err(e) = handle.watcher.stop().await {
                            tracing::warn!(
                                "failed to stop faulted watcher for '{}': {e}",
                                project.key
                            );
                        }
                        if orchestrator.inner.running.load(Ordering::SeqCst) {
                            orchestrator.schedule_retry(project);
                        }
                        return;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("event stream for '{}' lagged by {n} events", project.key);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }

    fn take_watcher(&self, key: &str) -> Option<WatcherHandle> {
        self.inner.watchers.lock().remove(key)
    }
}
