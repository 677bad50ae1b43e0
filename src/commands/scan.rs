use std::path::Path;

use owo_colors::OwoColorize;
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::print_json;
use crate::catalog::CategoryCounts;
use crate::classify::PatternClassifier;
use crate::error::{ArgusError, Result};
use crate::paths;
use crate::project::ProjectRegistry;
use crate::scanner::{ScanOptions, scan};

#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Size")]
    size_bytes: u64,
    #[tabled(rename = "Hashed")]
    hashed: &'static str,
}

/// One-off scan of a directory, without touching the catalog.
///
/// When the directory is a registered project root its configured
/// patterns apply; otherwise the built-in defaults do.
pub fn cmd_scan(root: &Path, skip_unknown: bool, output_json: bool) -> Result<()> {
    if !root.is_dir() {
        return Err(ArgusError::Config(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }
    let root = root.canonicalize()?;

    let registry = ProjectRegistry::load(&paths::registry_path())?;
    let project = registry.projects().iter().find(|p| p.root == root);
    let patterns = project.map(|p| p.patterns.clone()).unwrap_or_default();

    let classifier = PatternClassifier::from_config(&patterns)?;
    let options = ScanOptions {
        track_unknown: !skip_unknown,
    };
    let files = scan(&root, &classifier, &options)?;

    let mut counts = CategoryCounts::default();
    for file in &files {
        counts.add(file.category);
    }

    if output_json {
        return print_json(&json!({
            "root": root.display().to_string(),
            "project": project.map(|p| p.key.clone()),
            "total": files.len(),
            "counts": counts,
            "files": files,
        }));
    }

    if let Some(project) = project {
        println!("Scanning registered project '{}'", project.key.bold());
    }
    if files.is_empty() {
        println!("No trackable files under {}", root.display());
        return Ok(());
    }

    let rows: Vec<ScanRow> = files
        .iter()
        .map(|f| ScanRow {
            path: f.path.clone(),
            category: f.category.to_string(),
            size_bytes: f.size_bytes,
            hashed: if f.content_hash.is_some() {
                "yes"
            } else {
                "no"
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let summary = format!(
        "{} file(s): {} allow, {} unknown",
        files.len(),
        counts.allow,
        counts.unknown
    );
    if counts.unknown > 0 {
        println!(
            "{summary} {}",
            format!("({} awaiting a pattern decision)", counts.unknown).yellow()
        );
    } else {
        println!("{summary}");
    }
    Ok(())
}
