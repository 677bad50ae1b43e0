//! Reconciliation between observed files and the catalog.
//!
//! A full pass diffs one scan against the stored rows; the single-file
//! primitives are shared with the live watcher so both paths mutate
//! the catalog identically.

use std::collections::HashSet;

use serde::Serialize;

use super::{CatalogStore, Document, DocumentStatus};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::scanner::FileInfo;

/// Outcome counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files in the scanned set
    pub total: usize,
    pub new: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// How one observed file changed the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentChange {
    /// First sighting, row inserted
    Added,
    /// Content differs, row updated
    Updated,
    /// Content unchanged; timestamp and category refreshed
    Refreshed,
    /// Row soft-deleted
    Removed,
}

/// Diff a full scan against the catalog.
///
/// Rows absent from the scanned set are soft-deleted, never removed.
/// Reconciling an unchanged tree twice is a no-op the second time:
/// everything counts as `unchanged`.
pub async fn reconcile(
    store: &dyn CatalogStore,
    project_id: i64,
    files: &[FileInfo],
) -> Result<SyncReport> {
    let mut report = SyncReport {
        total: files.len(),
        ..Default::default()
    };

    let mut seen: HashSet<&str> = HashSet::with_capacity(files.len());
    for file in files {
        seen.insert(file.path.as_str());
        match apply_file(store, project_id, file).await? {
            DocumentChange::Added => report.new += 1,
            DocumentChange::Updated => report.modified += 1,
            _ => report.unchanged += 1,
        }
    }

    for path in store.active_paths(project_id).await? {
        if !seen.contains(path.as_str()) && store.mark_deleted(project_id, &path).await? {
            report.deleted += 1;
        }
    }

    Ok(report)
}

/// Upsert one observed file.
///
/// Hash comparison drives the outcome: equal hashes (or two absent
/// hashes, which cannot be diffed) refresh the row as `Tracked`;
/// anything else updates it as `Modified`. The category is always
/// recomputed from the file, so policy changes take effect on the next
/// sighting.
pub async fn apply_file(
    store: &dyn CatalogStore,
    project_id: i64,
    file: &FileInfo,
) -> Result<DocumentChange> {
    let existing = store.get(project_id, &file.path).await?;

    let change = match &existing {
        None => DocumentChange::Added,
        Some(doc) if hashes_match(doc.content_hash, file.content_hash) => {
            DocumentChange::Refreshed
        }
        Some(_) => DocumentChange::Updated,
    };

    let status = match change {
        DocumentChange::Updated => DocumentStatus::Modified,
        _ => DocumentStatus::Tracked,
    };

    store
        .upsert(Document::from_file(project_id, file, status))
        .await?;
    Ok(change)
}

/// Soft-delete one path. True when a live row was retired.
pub async fn apply_removal(
    store: &dyn CatalogStore,
    project_id: i64,
    path: &str,
) -> Result<bool> {
    store.mark_deleted(project_id, path).await
}

fn hashes_match(a: Option<ContentHash>, b: Option<ContentHash>) -> bool {
    match (a, b) {
        // Two absent hashes cannot be diffed; treat as unchanged.
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::classify::MonitorCategory;

    fn file(path: &str, content: &[u8]) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            size_bytes: content.len() as u64,
            content_hash: Some(ContentHash::from_bytes(content)),
            category: MonitorCategory::Allow,
            metadata: None,
        }
    }

    fn unhashed(path: &str, size_bytes: u64) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            size_bytes,
            content_hash: None,
            category: MonitorCategory::Unknown,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_first_pass_inserts_everything() {
        let store = MemoryCatalog::new();
        let files = vec![file("a.md", b"a"), file("b.md", b"b")];

        let report = reconcile(&store, 1, &files).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.new, 2);
        assert_eq!(report.modified, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.unchanged, 0);

        let row = store.get(1, "a.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Tracked);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let store = MemoryCatalog::new();
        let files = vec![file("a.md", b"a"), file("b.md", b"b")];

        reconcile(&store, 1, &files).await.unwrap();
        let report = reconcile(&store, 1, &files).await.unwrap();

        insta::assert_debug_snapshot!(report, @r"
        SyncReport {
            total: 2,
            new: 0,
            modified: 0,
            deleted: 0,
            unchanged: 2,
        }
        ");
    }

    #[tokio::test]
    async fn test_changed_content_counts_modified() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[file("a.md", b"v1")]).await.unwrap();

        let report = reconcile(&store, 1, &[file("a.md", b"v2")]).await.unwrap();
        assert_eq!(report.modified, 1);
        assert_eq!(report.new, 0);

        let row = store.get(1, "a.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Modified);

        // An unchanged follow-up settles the row back to tracked.
        let report = reconcile(&store, 1, &[file("a.md", b"v2")]).await.unwrap();
        assert_eq!(report.unchanged, 1);
        let row = store.get(1, "a.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Tracked);
    }

    #[tokio::test]
    async fn test_missing_files_soft_deleted() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[file("a.md", b"a"), file("b.md", b"b")])
            .await
            .unwrap();

        let report = reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.unchanged, 1);

        // Soft delete retains the row; the next pass does not count it
        // deleted again.
        let row = store.get(1, "b.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Deleted);
        let report = reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();
        assert_eq!(report.deleted, 0);
    }

    #[tokio::test]
    async fn test_resurrected_file_counts_unchanged() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();
        reconcile(&store, 1, &[]).await.unwrap();

        let report = reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();
        assert_eq!(report.unchanged, 1);
        let row = store.get(1, "a.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Tracked);
    }

    #[tokio::test]
    async fn test_both_hashes_absent_is_unchanged() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[unhashed("big.iso", 100)]).await.unwrap();

        // Size drifts, but with no hashes to diff the row stays
        // tracked and counts unchanged.
        let report = reconcile(&store, 1, &[unhashed("big.iso", 200)])
            .await
            .unwrap();
        assert_eq!(report.unchanged, 1);
        let row = store.get(1, "big.iso").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Tracked);
        assert_eq!(row.size_bytes, 200);
    }

    #[tokio::test]
    async fn test_hash_appearing_counts_modified() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[unhashed("notes.bin", 10)])
            .await
            .unwrap();

        let report = reconcile(&store, 1, &[file("notes.bin", b"now text")])
            .await
            .unwrap();
        assert_eq!(report.modified, 1);
    }

    #[tokio::test]
    async fn test_apply_removal_reports_liveness() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();

        assert!(apply_removal(&store, 1, "a.md").await.unwrap());
        assert!(!apply_removal(&store, 1, "a.md").await.unwrap());
        assert!(!apply_removal(&store, 1, "never.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_projects_do_not_interfere() {
        let store = MemoryCatalog::new();
        reconcile(&store, 1, &[file("a.md", b"a")]).await.unwrap();
        reconcile(&store, 2, &[file("a.md", b"other")]).await.unwrap();

        // Project 2's pass must not delete project 1's rows.
        let row = store.get(1, "a.md").await.unwrap().unwrap();
        assert_eq!(row.status, DocumentStatus::Tracked);
    }
}
