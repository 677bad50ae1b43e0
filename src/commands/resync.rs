use std::sync::Arc;

use owo_colors::OwoColorize;
use serde_json::json;

use super::print_json;
use crate::catalog::{CatalogStore, MemoryCatalog, SyncReport};
use crate::daemon::Orchestrator;
use crate::error::Result;
use crate::paths;
use crate::project::ProjectRegistry;
use crate::runtime::live_daemon_pid;

/// Full scan+reconcile for one project or all valid projects, then
/// persist the catalog snapshot.
pub async fn cmd_resync(key: Option<&str>, output_json: bool) -> Result<()> {
    if let Some(pid) = live_daemon_pid(&paths::pid_file_path()) {
        tracing::warn!(
            "daemon is running (pid {pid}); its next snapshot save may overwrite this resync"
        );
    }

    let registry = ProjectRegistry::load(&paths::registry_path())?;
    let snapshot = paths::snapshot_path();
    let store = Arc::new(MemoryCatalog::load(&snapshot)?);
    let orchestrator = Orchestrator::new(registry, store.clone() as Arc<dyn CatalogStore>);

    let reports: Vec<(String, SyncReport)> = match key {
        Some(key) => vec![(key.to_string(), orchestrator.resync_project(key).await?)],
        None => orchestrator.resync_all().await?,
    };

    store.save(&snapshot)?;

    if output_json {
        let projects: Vec<_> = reports
            .iter()
            .map(|(key, report)| json!({ "project": key, "report": report }))
            .collect();
        return print_json(&json!({
            "projects": projects,
            "snapshot": snapshot.display().to_string(),
        }));
    }

    if reports.is_empty() {
        println!("No valid projects registered.");
        return Ok(());
    }
    for (key, report) in &reports {
        println!(
            "{} {} file(s): {} new, {} modified, {} deleted, {} unchanged",
            format!("{key}:").bold(),
            report.total,
            report.new,
            report.modified,
            report.deleted,
            report.unchanged
        );
    }
    Ok(())
}
