//! In-memory catalog with NDJSON snapshots.
//!
//! The daemon holds the catalog in a `DashMap` and persists it as one
//! JSON document per line so restarts keep history, deleted rows
//! included.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CatalogStore, CategoryCounts, Document, DocumentStatus, now_iso_millis};
use crate::error::Result;

pub struct MemoryCatalog {
    docs: DashMap<(i64, String), Document>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    /// Load a snapshot. A missing file yields an empty catalog; a
    /// malformed line is skipped with a warning, never an error.
    pub fn load(path: &Path) -> Result<Self> {
        let catalog = Self::new();
        if !path.exists() {
            return Ok(catalog);
        }

        let content = fs::read_to_string(path)?;
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Document>(line) {
                Ok(doc) => {
                    catalog.docs.insert((doc.project_id, doc.path.clone()), doc);
                }
                Err(e) => {
                    tracing::warn!(
                        "skipping malformed snapshot line {}: {e}",
                        line_num + 1
                    );
                }
            }
        }
        Ok(catalog)
    }

    /// Write the whole catalog as NDJSON, sorted by (project, path) so
    /// snapshots diff cleanly.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut rows: Vec<Document> = self.docs.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| (a.project_id, &a.path).cmp(&(b.project_id, &b.path)));

        let mut out = String::new();
        for doc in &rows {
            out.push_str(&serde_json::to_string(doc)?);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn get(&self, project_id: i64, path: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .get(&(project_id, path.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn upsert(&self, doc: Document) -> Result<()> {
        self.docs.insert((doc.project_id, doc.path.clone()), doc);
        Ok(())
    }

    async fn active_paths(&self, project_id: i64) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .docs
            .iter()
            .filter(|r| r.key().0 == project_id && r.value().status != DocumentStatus::Deleted)
            .map(|r| r.key().1.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn mark_deleted(&self, project_id: i64, path: &str) -> Result<bool> {
        if let Some(mut entry) = self.docs.get_mut(&(project_id, path.to_string())) {
            let doc = entry.value_mut();
            if doc.status != DocumentStatus::Deleted {
                doc.status = DocumentStatus::Deleted;
                doc.last_scanned_at = now_iso_millis();
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn documents(&self, project_id: i64) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .filter(|r| r.key().0 == project_id)
            .map(|r| r.value().clone())
            .collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(docs)
    }

    async fn category_counts(&self, project_id: i64) -> Result<CategoryCounts> {
        let mut counts = CategoryCounts::default();
        for r in self.docs.iter() {
            if r.key().0 == project_id && r.value().status != DocumentStatus::Deleted {
                counts.add(r.value().category);
            }
        }
        Ok(counts)
    }
}
