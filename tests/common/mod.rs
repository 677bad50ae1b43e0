//! Shared fixtures for integration tests: temp project trees carrying
//! the `.argus` marker, plus registry builders around them.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use argus::config::DaemonConfig;
use argus::project::{PatternConfig, Project, ProjectRegistry};

/// One registered project rooted in its own temp directory.
pub struct ProjectFixture {
    pub temp_dir: TempDir,
    pub project: Project,
}

impl ProjectFixture {
    pub fn new(id: i64, key: &str) -> Self {
        Self::with_patterns(id, key, PatternConfig::default())
    }

    pub fn with_patterns(id: i64, key: &str, patterns: PatternConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join(".argus")).expect("failed to create marker dir");
        let project = Project {
            id,
            key: key.to_string(),
            root: temp_dir.path().to_path_buf(),
            patterns,
        };
        Self { temp_dir, project }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, content).expect("failed to write file");
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root().join(rel)).expect("failed to remove file");
    }
}

/// Registry over the given fixtures, with default daemon tunables.
pub fn registry_of(fixtures: &[&ProjectFixture]) -> ProjectRegistry {
    let projects = fixtures.iter().map(|f| f.project.clone()).collect();
    ProjectRegistry::from_projects(projects).expect("registry should build")
}

/// Registry with timing tuned down so watcher tests finish quickly.
pub fn fast_registry_of(fixtures: &[&ProjectFixture]) -> ProjectRegistry {
    let mut registry = registry_of(fixtures);
    registry.daemon = DaemonConfig {
        max_watcher_retries: 3,
        initial_backoff_ms: 20,
        debounce_ms: 80,
        shutdown_timeout_ms: 1_000,
        poll_watches: false,
        poll_interval_ms: 50,
    };
    registry
}
