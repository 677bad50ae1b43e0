//! Live change detection: watch backends, per-path debouncing, and the
//! per-project watcher that feeds settled events into the catalog.

pub mod backend;
pub mod debounce;
pub mod watcher;

pub use backend::{EventSource, NotifyBackend, PollBackend, RawEvent, RawEventKind, WatchBackend};
pub use debounce::DebounceMap;
pub use watcher::{
    DEFAULT_WATCH_PATTERNS, ProjectWatcher, WatcherConfig, WatcherEvent, WatcherStats,
    translate_gitignore,
};
