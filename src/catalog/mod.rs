//! The document catalog.
//!
//! One row per (project, path). Rows are soft-deleted only: a file
//! vanishing from disk retires its row to `Deleted` but the row stays
//! for history. The storage seam is `CatalogStore`; `MemoryCatalog` is
//! the bundled implementation.

pub mod memory;
pub mod reconcile;

pub use memory::MemoryCatalog;
pub use reconcile::{DocumentChange, SyncReport, apply_file, apply_removal, reconcile};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classify::MonitorCategory;
use crate::enum_display_fromstr;
use crate::error::Result;
use crate::frontmatter::DocMetadata;
use crate::hash::ContentHash;
use crate::scanner::FileInfo;

/// Lifecycle state of a catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Tracked,
    Modified,
    Deleted,
}

enum_display_fromstr!(
    DocumentStatus,
    crate::error::ArgusError::InvalidStatus,
    {
        Tracked => "tracked",
        Modified => "modified",
        Deleted => "deleted",
    }
);

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub project_id: i64,

    /// Path relative to the project root, `/`-separated
    pub path: String,

    /// `None` means presence is tracked but content is not diffed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,

    pub size_bytes: u64,

    pub status: DocumentStatus,

    pub category: MonitorCategory,

    /// ISO 8601 timestamp with milliseconds
    pub last_scanned_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocMetadata>,
}

impl Document {
    /// Build a row from one observed file.
    pub fn from_file(project_id: i64, file: &FileInfo, status: DocumentStatus) -> Self {
        Self {
            project_id,
            path: file.path.clone(),
            content_hash: file.content_hash,
            size_bytes: file.size_bytes,
            status,
            category: file.category,
            last_scanned_at: now_iso_millis(),
            metadata: file.metadata.clone(),
        }
    }

    /// Derived, never stored: unknown-category rows await a human
    /// pattern decision.
    pub fn needs_review(&self) -> bool {
        self.category == MonitorCategory::Unknown
    }
}

/// Live (non-deleted) row totals per monitoring category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub allow: usize,
    pub deny: usize,
    pub unknown: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, category: MonitorCategory) {
        match category {
            MonitorCategory::Allow => self.allow += 1,
            MonitorCategory::Deny => self.deny += 1,
            MonitorCategory::Unknown => self.unknown += 1,
        }
    }

    pub fn merge(&mut self, other: &CategoryCounts) {
        self.allow += other.allow;
        self.deny += other.deny;
        self.unknown += other.unknown;
    }

    pub fn total(&self) -> usize {
        self.allow + self.deny + self.unknown
    }
}

/// Storage seam for the catalog. Write failures propagate to the
/// caller; there is no internal retry.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one row.
    async fn get(&self, project_id: i64, path: &str) -> Result<Option<Document>>;

    /// Insert or replace one row.
    async fn upsert(&self, doc: Document) -> Result<()>;

    /// Paths of rows not currently `Deleted`, sorted.
    async fn active_paths(&self, project_id: i64) -> Result<Vec<String>>;

    /// Soft-delete one row. True when a non-deleted row was retired;
    /// false for missing or already-deleted rows.
    async fn mark_deleted(&self, project_id: i64, path: &str) -> Result<bool>;

    /// Every row of a project, deleted included, sorted by path.
    async fn documents(&self, project_id: i64) -> Result<Vec<Document>>;

    /// Per-category totals over non-deleted rows.
    async fn category_counts(&self, project_id: i64) -> Result<CategoryCounts>;
}

/// Current time as ISO 8601 with milliseconds.
pub(crate) fn now_iso_millis() -> String {
    jiff::Timestamp::now()
        .strftime("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_info(path: &str, category: MonitorCategory) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            size_bytes: 4,
            content_hash: Some(ContentHash::from_bytes(b"body")),
            category,
            metadata: None,
        }
    }

    #[test]
    fn test_needs_review_tracks_category() {
        let doc = Document::from_file(
            1,
            &file_info("a.md", MonitorCategory::Allow),
            DocumentStatus::Tracked,
        );
        assert!(!doc.needs_review());

        let doc = Document::from_file(
            1,
            &file_info("x.py", MonitorCategory::Unknown),
            DocumentStatus::Tracked,
        );
        assert!(doc.needs_review());
    }

    #[test]
    fn test_status_display_from_str() {
        assert_eq!(DocumentStatus::Tracked.to_string(), "tracked");
        assert_eq!(
            "deleted".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::Deleted
        );
        assert!("gone".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_document_serde_round_trip() {
        let doc = Document::from_file(
            3,
            &file_info("docs/a.md", MonitorCategory::Allow),
            DocumentStatus::Modified,
        );
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_document_serde_without_hash() {
        let mut info = file_info("big.iso", MonitorCategory::Unknown);
        info.content_hash = None;
        let doc = Document::from_file(1, &info, DocumentStatus::Tracked);

        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("content_hash"));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content_hash, None);
    }

    #[test]
    fn test_category_counts() {
        let mut counts = CategoryCounts::default();
        counts.add(MonitorCategory::Allow);
        counts.add(MonitorCategory::Allow);
        counts.add(MonitorCategory::Unknown);
        assert_eq!(counts.allow, 2);
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.total(), 3);

        let mut merged = CategoryCounts::default();
        merged.merge(&counts);
        merged.merge(&counts);
        assert_eq!(merged.total(), 6);
    }
}
