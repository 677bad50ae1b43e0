//! Aggregate daemon status and its table rendering.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::catalog::CategoryCounts;
use crate::watch::WatcherStats;

/// Snapshot of the orchestrator and every registered project.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub projects: Vec<ProjectStatus>,
    /// Live document totals across projects with an attached watcher
    pub totals: CategoryCounts,
}

/// One registered project as the orchestrator sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub key: String,
    pub root: String,
    pub valid: bool,
    pub watching: bool,
    /// Watcher permanently disabled after repeated failures
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<WatcherStats>,
}

impl ProjectStatus {
    fn state(&self) -> &'static str {
        if !self.valid {
            "invalid"
        } else if self.watching {
            "watching"
        } else if self.disabled {
            "disabled"
        } else {
            "idle"
        }
    }
}

/// A row in the project status table
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Root")]
    root: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Watched")]
    watched: String,
    #[tabled(rename = "Events")]
    events: String,
    #[tabled(rename = "Last Event")]
    last_event: String,
}

impl DaemonStatus {
    /// Render the per-project table shown by `argus status`.
    pub fn render_table(&self) -> String {
        let rows: Vec<StatusRow> = self
            .projects
            .iter()
            .map(|project| StatusRow {
                project: project.key.clone(),
                root: project.root.clone(),
                state: project.state().to_string(),
                watched: project
                    .stats
                    .as_ref()
                    .map(|s| s.files_watched.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                events: project
                    .stats
                    .as_ref()
                    .map(|s| s.events_processed.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                last_event: project
                    .stats
                    .as_ref()
                    .and_then(|s| s.last_event_at.clone())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        table.to_string()
    }
}
