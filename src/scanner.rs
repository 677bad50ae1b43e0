//! Recursive project scans.
//!
//! A scan walks the tree, classifies every file, and produces the
//! `FileInfo` records the reconciler consumes. It never writes and it
//! never aborts because of one unreadable entry.

use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::classify::{MonitorCategory, PatternClassifier, normalize_path};
use crate::error::Result;
use crate::frontmatter::{self, DocMetadata};
use crate::hash::ContentHash;

/// Non-allow files at or above this size are tracked without a hash.
pub const HASH_SIZE_CEILING: u64 = 10 * 1024 * 1024;

/// Extensions whose content is never hashed unless the file is
/// allow-category. Compared case-insensitively.
pub const KNOWN_BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "tar", "gz", "bz2", "xz",
    "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "bin", "dat", "db", "sqlite", "woff",
    "woff2", "ttf", "otf", "eot", "mp3", "mp4", "avi", "mov", "mkv", "webm", "wav", "flac", "ogg",
    "class", "jar", "pyc", "wasm",
];

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];

/// Scan behavior switches.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Track files matching neither allow nor deny (default: true)
    pub track_unknown: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            track_unknown: true,
        }
    }
}

/// One observed file, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    pub size_bytes: u64,
    /// `None` means presence is tracked but content is not diffed
    pub content_hash: Option<ContentHash>,
    pub category: MonitorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocMetadata>,
}

/// Walk `root` and return every trackable file, sorted by path.
///
/// Hard-ignored directories are pruned without descending. Walk errors
/// and unreadable files are skipped with a log line; the scan itself
/// only fails when the root cannot be walked at all.
pub fn scan(
    root: &Path,
    classifier: &PatternClassifier,
    options: &ScanOptions,
) -> Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !prunes_subtree(root, classifier, entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("scan: skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        match scan_entry(entry.path(), rel, classifier, options) {
            Ok(Some(info)) => files.push(info),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("scan: skipping {}: {e}", rel.display());
            }
        }
    }

    Ok(files)
}

/// Build the `FileInfo` for a single path under `root`.
///
/// Used by the live watcher after an event settles. Returns `Ok(None)`
/// when current policy excludes the file; a missing file surfaces as an
/// IO error so the caller can treat it as a removal.
pub fn scan_file(
    root: &Path,
    rel: &Path,
    classifier: &PatternClassifier,
    options: &ScanOptions,
) -> Result<Option<FileInfo>> {
    scan_entry(&root.join(rel), rel, classifier, options)
}

fn prunes_subtree(root: &Path, classifier: &PatternClassifier, entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    match entry.path().strip_prefix(root) {
        // The root itself has an empty relative path and is never pruned.
        Ok(rel) if !rel.as_os_str().is_empty() => classifier.prunes(rel),
        _ => false,
    }
}

fn scan_entry(
    abs: &Path,
    rel: &Path,
    classifier: &PatternClassifier,
    options: &ScanOptions,
) -> Result<Option<FileInfo>> {
    let category = classifier.classify(rel);
    match category {
        MonitorCategory::Deny => return Ok(None),
        MonitorCategory::Unknown if !options.track_unknown => return Ok(None),
        _ => {}
    }

    let stat = fs::metadata(abs)?;
    if !stat.is_file() {
        return Ok(None);
    }
    let size_bytes = stat.len();

    let (content_hash, metadata) = if category == MonitorCategory::Allow && is_markdown(rel) {
        // One read serves both the hash and the frontmatter pass.
        let bytes = fs::read(abs)?;
        let metadata = std::str::from_utf8(&bytes)
            .ok()
            .and_then(frontmatter::extract)
            .filter(|m| !m.is_empty());
        (Some(ContentHash::from_bytes(&bytes)), metadata)
    } else if should_hash(category, rel, size_bytes) {
        (Some(ContentHash::from_file(abs)?), None)
    } else {
        (None, None)
    };

    Ok(Some(FileInfo {
        path: normalize_path(rel),
        size_bytes,
        content_hash,
        category,
        metadata,
    }))
}

/// Allow-category files are always hashed. Anything else is hashed only
/// when it is small enough and does not look binary.
fn should_hash(category: MonitorCategory, rel: &Path, size_bytes: u64) -> bool {
    if category == MonitorCategory::Allow {
        return true;
    }
    size_bytes < HASH_SIZE_CEILING && !has_known_binary_extension(rel)
}

fn extension(rel: &Path) -> Option<&str> {
    rel.extension().and_then(|e| e.to_str())
}

fn has_known_binary_extension(rel: &Path) -> bool {
    match extension(rel) {
        Some(ext) => KNOWN_BINARY_EXTENSIONS.iter().any(|k| unicase::eq(*k, ext)),
        None => false,
    }
}

pub(crate) fn is_markdown(rel: &Path) -> bool {
    match extension(rel) {
        Some(ext) => MARKDOWN_EXTENSIONS.iter().any(|k| unicase::eq(*k, ext)),
        None => false,
    }
}
