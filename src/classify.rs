//! Three-way path classification against project pattern policy.
//!
//! Every file under a project root lands in exactly one category:
//! `allow` (tracked fully), `deny` (excluded), or `unknown` (tracked
//! minimally and flagged for review). A fixed hard-ignore list runs
//! before any project configuration and also drives directory pruning
//! during traversal.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::enum_display_fromstr;
use crate::error::{ArgusError, Result};
use crate::project::PatternConfig;

/// Directory names that are never descended into, regardless of
/// project configuration.
pub const HARD_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".argus",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".idea",
    ".vscode",
    ".next",
    ".cache",
    "vendor",
];

/// File patterns that are always excluded, regardless of project
/// configuration.
pub const HARD_IGNORE_FILES: &[&str] = &[
    "**/.DS_Store",
    "**/Thumbs.db",
    "**/*.swp",
    "**/*.swo",
    "**/*~",
    "**/.#*",
];

/// Deny patterns applied when a project configures none of its own.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    "**/*.log",
    "**/*.tmp",
    "**/*.temp",
    "**/*.bak",
    "**/*.orig",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.map",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.pdf",
    "**/*.zip",
    "**/*.tar",
    "**/*.gz",
    "**/*.exe",
    "**/*.dll",
    "**/*.so",
    "**/*.dylib",
];

static HARD_IGNORE: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for dir in HARD_IGNORE_DIRS {
        // One pattern for the directory itself (pruning), one for its
        // contents (file classification).
        for pattern in [format!("**/{dir}"), format!("**/{dir}/**")] {
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
                .expect("hard-ignore dir pattern is valid");
            builder.add(glob);
        }
    }
    for pattern in HARD_IGNORE_FILES {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .expect("hard-ignore file pattern is valid");
        builder.add(glob);
    }
    builder.build().expect("hard-ignore set compiles")
});

/// Monitoring category assigned to every path under a project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorCategory {
    Allow,
    Deny,
    Unknown,
}

enum_display_fromstr!(
    MonitorCategory,
    crate::error::ArgusError::InvalidCategory,
    {
        Allow => "allow",
        Deny => "deny",
        Unknown => "unknown",
    }
);

/// Compiled allow/deny pattern sets for one project.
///
/// Classification precedence, first match wins:
/// hard-ignore, then allow, then deny, then unknown.
#[derive(Debug)]
pub struct PatternClassifier {
    allow: GlobSet,
    deny: GlobSet,
}

impl PatternClassifier {
    /// Compile a classifier from explicit pattern lists. An empty deny
    /// list falls back to [`DEFAULT_DENY_PATTERNS`]; an empty allow
    /// list matches nothing.
    pub fn new(allow: &[String], deny: &[String]) -> Result<Self> {
        let deny_owned;
        let deny = if deny.is_empty() {
            deny_owned = DEFAULT_DENY_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>();
            &deny_owned
        } else {
            deny
        };

        Ok(Self {
            allow: compile_set(allow)?,
            deny: compile_set(deny)?,
        })
    }

    /// Compile a classifier from a project's pattern configuration.
    pub fn from_config(config: &PatternConfig) -> Result<Self> {
        Self::new(&config.allow, &config.deny)
    }

    /// Classify a path relative to the project root.
    pub fn classify(&self, rel: &Path) -> MonitorCategory {
        let normalized = normalize_path(rel);
        if HARD_IGNORE.is_match(&normalized) {
            return MonitorCategory::Deny;
        }
        if self.allow.is_match(&normalized) {
            return MonitorCategory::Allow;
        }
        if self.deny.is_match(&normalized) {
            return MonitorCategory::Deny;
        }
        MonitorCategory::Unknown
    }

    /// True when traversal must skip this directory subtree entirely.
    ///
    /// Only hard-ignores prune: a project deny pattern on a directory
    /// must not hide allow matches deeper in the tree.
    pub fn prunes(&self, rel_dir: &Path) -> bool {
        is_hard_ignored(rel_dir)
    }
}

/// True when the path matches the fixed hard-ignore set.
pub(crate) fn is_hard_ignored(rel: &Path) -> bool {
    HARD_IGNORE.is_match(normalize_path(rel))
}

/// Normalize a relative path to `/`-separated form so glob matching
/// and catalog keys behave identically across platforms.
pub(crate) fn normalize_path(rel: &Path) -> String {
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

pub(crate) fn compile_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ArgusError::InvalidPattern(pattern.clone(), e.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ArgusError::Other(format!("failed to compile pattern set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn classifier(allow: &[&str], deny: &[&str]) -> PatternClassifier {
        let allow: Vec<String> = allow.iter().map(|s| s.to_string()).collect();
        let deny: Vec<String> = deny.iter().map(|s| s.to_string()).collect();
        PatternClassifier::new(&allow, &deny).unwrap()
    }

    #[test]
    fn test_allow_match() {
        let c = classifier(&["**/*.md"], &["**/*.ts"]);
        assert_eq!(
            c.classify(Path::new("docs/a.md")),
            MonitorCategory::Allow
        );
        assert_eq!(c.classify(Path::new("a.md")), MonitorCategory::Allow);
    }

    #[test]
    fn test_deny_match() {
        let c = classifier(&["**/*.md"], &["**/*.ts"]);
        assert_eq!(
            c.classify(Path::new("src/util.ts")),
            MonitorCategory::Deny
        );
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        let c = classifier(&["**/*.md"], &["**/*.ts"]);
        assert_eq!(
            c.classify(Path::new("src/util.py")),
            MonitorCategory::Unknown
        );
    }

    #[test]
    fn test_allow_wins_over_deny() {
        // Same path matches both sets; allow is checked first.
        let c = classifier(&["docs/**"], &["**/*.md"]);
        assert_eq!(
            c.classify(Path::new("docs/notes.md")),
            MonitorCategory::Allow
        );
        assert_eq!(
            c.classify(Path::new("src/notes.md")),
            MonitorCategory::Deny
        );
    }

    #[test]
    fn test_hard_ignore_wins_over_allow() {
        let c = classifier(&["**/*.js"], &[]);
        assert_eq!(
            c.classify(Path::new("node_modules/lib/x.js")),
            MonitorCategory::Deny
        );
        assert_eq!(
            c.classify(Path::new("deep/node_modules/x.js")),
            MonitorCategory::Deny
        );
        assert_eq!(
            c.classify(Path::new(".git/config")),
            MonitorCategory::Deny
        );
    }

    #[test]
    fn test_hard_ignore_requires_whole_component() {
        // "distribute" must not be swallowed by the "dist" hard-ignore.
        let c = classifier(&["**/*.md"], &[]);
        assert_eq!(
            c.classify(Path::new("distribute/readme.md")),
            MonitorCategory::Allow
        );
        assert_eq!(
            c.classify(Path::new("dist/readme.md")),
            MonitorCategory::Deny
        );
    }

    #[test]
    fn test_system_files_hard_ignored() {
        let c = classifier(&["**/*"], &[]);
        assert_eq!(
            c.classify(Path::new("src/.DS_Store")),
            MonitorCategory::Deny
        );
        assert_eq!(
            c.classify(Path::new("notes.md.swp")),
            MonitorCategory::Deny
        );
    }

    #[test]
    fn test_default_deny_fallback() {
        // No deny patterns configured: built-in defaults apply.
        let c = classifier(&["**/*.md"], &[]);
        assert_eq!(
            c.classify(Path::new("server/output.log")),
            MonitorCategory::Deny
        );
        assert_eq!(
            c.classify(Path::new("assets/logo.png")),
            MonitorCategory::Deny
        );
        // Defaults are replaced, not merged, when a project configures
        // its own deny list.
        let c = classifier(&["**/*.md"], &["**/*.ts"]);
        assert_eq!(
            c.classify(Path::new("server/output.log")),
            MonitorCategory::Unknown
        );
    }

    #[test]
    fn test_prunes_hard_ignored_dirs_only() {
        let c = classifier(&["**/*.md"], &["drafts/**"]);
        assert!(c.prunes(Path::new("node_modules")));
        assert!(c.prunes(Path::new("packages/app/node_modules")));
        assert!(c.prunes(Path::new(".git")));
        // Deny patterns never prune.
        assert!(!c.prunes(Path::new("drafts")));
        assert!(!c.prunes(Path::new("docs")));
    }

    #[test]
    fn test_star_does_not_cross_separator() {
        let c = classifier(&["docs/*.md"], &[]);
        assert_eq!(
            c.classify(Path::new("docs/a.md")),
            MonitorCategory::Allow
        );
        assert_eq!(
            c.classify(Path::new("docs/sub/a.md")),
            MonitorCategory::Unknown
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PatternClassifier::new(&["[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, ArgusError::InvalidPattern(_, _)));
    }

    #[test]
    fn test_normalize_path() {
        let p: PathBuf = ["docs", "sub", "a.md"].iter().collect();
        assert_eq!(normalize_path(&p), "docs/sub/a.md");
        assert_eq!(normalize_path(Path::new("")), "");
    }

    #[test]
    fn test_category_display_from_str() {
        assert_eq!(MonitorCategory::Allow.to_string(), "allow");
        assert_eq!(
            "deny".parse::<MonitorCategory>().unwrap(),
            MonitorCategory::Deny
        );
        assert!("weird".parse::<MonitorCategory>().is_err());
    }
}
