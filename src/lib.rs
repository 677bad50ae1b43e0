pub mod catalog;
pub mod classify;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod frontmatter;
pub mod hash;
pub mod macros;
pub mod paths;
pub mod project;
pub mod runtime;
pub mod scanner;
pub mod watch;

pub use catalog::{
    CatalogStore, CategoryCounts, Document, DocumentChange, DocumentStatus, MemoryCatalog,
    SyncReport, apply_file, apply_removal, reconcile,
};
pub use classify::{MonitorCategory, PatternClassifier};
pub use config::DaemonConfig;
pub use daemon::{DaemonEvent, DaemonStatus, Orchestrator, ProjectStatus};
pub use error::{ArgusError, Result};
pub use frontmatter::DocMetadata;
pub use hash::ContentHash;
pub use project::{PatternConfig, Project, ProjectRegistry};
pub use scanner::{FileInfo, ScanOptions, scan, scan_file};
pub use watch::{ProjectWatcher, WatcherConfig, WatcherEvent, WatcherStats, translate_gitignore};
