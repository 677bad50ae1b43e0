//! Project registry.
//!
//! Projects are registered in a YAML file and consumed read-only by
//! the sync subsystem. A project is only watchable while its root
//! exists and carries the `.argus/` marker directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::DaemonConfig;
use crate::error::{ArgusError, Result};

/// Marker directory that makes a tree a registered project root.
pub const PROJECT_MARKER_DIR: &str = ".argus";

/// Pattern policy for one project. Empty lists mean "use defaults".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Fully tracked paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,

    /// Excluded paths (built-in defaults when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,

    /// Globs the live watcher reacts to (built-in doc set when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watch: Vec<String>,

    /// Extra ignore patterns merged with the project's `.gitignore`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    /// Track files matching neither allow nor deny (default: true)
    #[serde(default = "default_track_unknown")]
    pub track_unknown: bool,
}

fn default_track_unknown() -> bool {
    true
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
            watch: Vec::new(),
            ignore: Vec::new(),
            track_unknown: default_track_unknown(),
        }
    }
}

/// A registered project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Registry position, 1-based; assigned at load when absent
    #[serde(default)]
    pub id: i64,

    /// Stable human-facing identifier, unique within the registry
    pub key: String,

    /// Absolute path to the project root
    pub root: PathBuf,

    #[serde(default, skip_serializing_if = "is_default_patterns")]
    pub patterns: PatternConfig,
}

fn is_default_patterns(patterns: &PatternConfig) -> bool {
    *patterns == PatternConfig::default()
}

impl Project {
    /// A project is valid while its root exists and carries the
    /// `.argus` marker. Invalid projects are skipped, never errored on.
    pub fn is_valid(&self) -> bool {
        self.root.is_dir() && self.marker_dir().is_dir()
    }

    /// Path to the project's `.argus` marker directory.
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(PROJECT_MARKER_DIR)
    }
}

/// On-disk shape of the registry file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    projects: Vec<Project>,

    #[serde(default, skip_serializing_if = "DaemonConfig::is_default")]
    daemon: DaemonConfig,
}

/// The set of registered projects plus daemon tunables.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
    pub daemon: DaemonConfig,
}

impl ProjectRegistry {
    /// Load the registry from a YAML file. A missing file yields an
    /// empty registry; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let file: RegistryFile = serde_yaml_ng::from_str(&content)?;
        let mut registry = Self::from_projects(file.projects)?;
        registry.daemon = file.daemon;
        Ok(registry)
    }

    /// Build a registry from an in-memory project list, assigning
    /// positional ids and rejecting duplicate keys.
    pub fn from_projects(mut projects: Vec<Project>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (index, project) in projects.iter_mut().enumerate() {
            if project.key.trim().is_empty() {
                return Err(ArgusError::Config(format!(
                    "project at position {} has an empty key",
                    index + 1
                )));
            }
            if !seen.insert(project.key.clone()) {
                return Err(ArgusError::Config(format!(
                    "duplicate project key '{}'",
                    project.key
                )));
            }
            if project.id == 0 {
                project.id = index as i64 + 1;
            }
        }
        Ok(Self {
            projects,
            daemon: DaemonConfig::default(),
        })
    }

    /// All registered projects, valid or not.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Projects whose roots are currently watchable.
    pub fn valid_projects(&self) -> Vec<Project> {
        self.projects
            .iter()
            .filter(|p| p.is_valid())
            .cloned()
            .collect()
    }

    /// Look up a project by key.
    pub fn get(&self, key: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.key == key)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
