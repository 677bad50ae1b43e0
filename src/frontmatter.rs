//! YAML frontmatter extraction for tracked Markdown documents.
//!
//! Only the metadata block is interpreted here. The body and any
//! Markdown semantics stay untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Match frontmatter: ---\n...\n---, tolerating CRLF line endings.
static FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---(?:\r?\n|$)").unwrap());

/// Metadata extracted from a document's frontmatter block.
///
/// Unknown keys are ignored so user documents can carry arbitrary
/// extra fields without breaking a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DocMetadata {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.tags.is_empty()
    }
}

/// Extract metadata from a document's leading frontmatter block.
///
/// Returns `None` when the block is missing or its YAML fails to
/// parse. A malformed document must never fail a scan, so there is no
/// error path here.
pub fn extract(content: &str) -> Option<DocMetadata> {
    let captures = FRONTMATTER_RE.captures(content)?;
    let yaml = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    if yaml.trim().is_empty() {
        return None;
    }
    serde_yaml_ng::from_str::<DocMetadata>(yaml).ok()
}
