use std::sync::Arc;

use owo_colors::OwoColorize;
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::print_json;
use crate::catalog::{CatalogStore, CategoryCounts, DocumentStatus, MemoryCatalog};
use crate::error::Result;
use crate::paths;
use crate::project::ProjectRegistry;
use crate::runtime::live_daemon_pid;

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Project")]
    key: String,
    #[tabled(rename = "Root")]
    root: String,
    #[tabled(rename = "Valid")]
    valid: &'static str,
    #[tabled(rename = "Allow")]
    allow: usize,
    #[tabled(rename = "Unknown")]
    unknown: usize,
    #[tabled(rename = "Deleted")]
    deleted: usize,
}

/// Registry and catalog overview from the persisted snapshot.
///
/// Live watcher stats belong to the daemon process; this command shows
/// whether that process is up and what the catalog last recorded.
pub async fn cmd_status(output_json: bool) -> Result<()> {
    let registry = ProjectRegistry::load(&paths::registry_path())?;
    let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalog::load(&paths::snapshot_path())?);
    let daemon_pid = live_daemon_pid(&paths::pid_file_path());

    let mut rows = Vec::new();
    let mut entries = Vec::new();
    let mut totals = CategoryCounts::default();

    for project in registry.projects() {
        let counts = store.category_counts(project.id).await?;
        totals.merge(&counts);
        let deleted = store
            .documents(project.id)
            .await?
            .iter()
            .filter(|doc| doc.status == DocumentStatus::Deleted)
            .count();

        rows.push(CatalogRow {
            key: project.key.clone(),
            root: project.root.display().to_string(),
            valid: if project.is_valid() { "yes" } else { "no" },
            allow: counts.allow,
            unknown: counts.unknown,
            deleted,
        });
        entries.push(json!({
            "key": project.key,
            "root": project.root.display().to_string(),
            "valid": project.is_valid(),
            "counts": counts,
            "deleted": deleted,
        }));
    }

    if output_json {
        return print_json(&json!({
            "daemon": { "running": daemon_pid.is_some(), "pid": daemon_pid },
            "projects": entries,
            "totals": totals,
        }));
    }

    match daemon_pid {
        Some(pid) => println!("Daemon: {} (pid {pid})", "running".green()),
        None => println!("Daemon: {}", "stopped".red()),
    }

    if registry.is_empty() {
        println!("No projects registered.");
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} tracked file(s) across {} project(s)",
        totals.total(),
        registry.len()
    );
    Ok(())
}
