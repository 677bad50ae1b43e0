//! Batch synchronization flows through the public API: scan,
//! reconcile, registry loading, and snapshot persistence.

mod common;

use std::fs;
use std::sync::Arc;

use argus::catalog::{CatalogStore, DocumentStatus, MemoryCatalog, reconcile};
use argus::classify::{MonitorCategory, PatternClassifier};
use argus::daemon::Orchestrator;
use argus::hash::ContentHash;
use argus::project::{PatternConfig, ProjectRegistry};
use argus::scanner::{ScanOptions, scan};

use common::ProjectFixture;

fn doc_patterns() -> PatternConfig {
    PatternConfig {
        allow: vec!["**/*.md".to_string()],
        deny: vec!["**/node_modules/**".to_string()],
        ..PatternConfig::default()
    }
}

#[tokio::test]
async fn test_second_resync_over_unchanged_tree_is_all_unchanged() {
    let fixture = ProjectFixture::with_patterns(1, "demo", doc_patterns());
    fixture.write("docs/a.md", "# a");
    fixture.write("docs/b.md", "# b");
    fixture.write("src/x.py", "x = 1");

    let store = Arc::new(MemoryCatalog::new());
    let orchestrator = Orchestrator::new(
        common::registry_of(&[&fixture]),
        store as Arc<dyn CatalogStore>,
    );

    let first = orchestrator.resync_all().await.expect("first resync");
    assert_eq!(first.len(), 1);
    let (key, report) = &first[0];
    assert_eq!(key, "demo");
    assert_eq!((report.total, report.new), (3, 3));

    let second = orchestrator
        .resync_project("demo")
        .await
        .expect("second resync");
    assert_eq!(
        (second.new, second.modified, second.deleted, second.unchanged),
        (0, 0, 0, 3)
    );
}

#[tokio::test]
async fn test_modified_file_reported_once_and_hash_updates() {
    let fixture = ProjectFixture::with_patterns(1, "demo", doc_patterns());
    fixture.write("docs/a.md", "# first draft");

    let store = Arc::new(MemoryCatalog::new());
    let orchestrator = Orchestrator::new(
        common::registry_of(&[&fixture]),
        store.clone() as Arc<dyn CatalogStore>,
    );
    orchestrator.resync_project("demo").await.unwrap();

    fixture.write("docs/a.md", "# second draft");
    let report = orchestrator.resync_project("demo").await.unwrap();
    assert_eq!((report.new, report.modified, report.deleted), (0, 1, 0));

    let row = store.get(1, "docs/a.md").await.unwrap().unwrap();
    assert_eq!(row.status, DocumentStatus::Modified);
    assert_eq!(
        row.content_hash,
        Some(ContentHash::from_bytes(b"# second draft"))
    );

    // Nothing changed since, so the next pass settles again.
    let settled = orchestrator.resync_project("demo").await.unwrap();
    assert_eq!((settled.modified, settled.unchanged), (0, 1));
}

#[tokio::test]
async fn test_removed_file_is_soft_deleted_and_rows_are_kept() {
    let fixture = ProjectFixture::with_patterns(1, "demo", doc_patterns());
    fixture.write("docs/keep.md", "# keep");
    fixture.write("docs/gone.md", "# gone");

    let store = Arc::new(MemoryCatalog::new());
    let orchestrator = Orchestrator::new(
        common::registry_of(&[&fixture]),
        store.clone() as Arc<dyn CatalogStore>,
    );
    orchestrator.resync_project("demo").await.unwrap();
    assert_eq!(store.documents(1).await.unwrap().len(), 2);

    fixture.remove("docs/gone.md");
    let report = orchestrator.resync_project("demo").await.unwrap();
    assert_eq!((report.deleted, report.unchanged), (1, 1));

    // The row survives as history; the catalog never shrinks.
    let docs = store.documents(1).await.unwrap();
    assert_eq!(docs.len(), 2);
    let gone = docs.iter().find(|d| d.path == "docs/gone.md").unwrap();
    assert_eq!(gone.status, DocumentStatus::Deleted);
    assert_eq!(store.active_paths(1).await.unwrap(), vec!["docs/keep.md"]);
}

#[test]
fn test_classification_of_a_mixed_tree() {
    let fixture = ProjectFixture::with_patterns(1, "demo", doc_patterns());
    fixture.write("docs/a.md", "# a");
    fixture.write("node_modules/x.js", "module.exports = 1;");
    fixture.write("src/util.ts", "export {};");

    let classifier = PatternClassifier::from_config(&doc_patterns()).unwrap();
    let files = scan(fixture.root(), &classifier, &ScanOptions::default()).unwrap();

    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["docs/a.md", "src/util.ts"]);
    assert_eq!(files[0].category, MonitorCategory::Allow);
    assert_eq!(files[1].category, MonitorCategory::Unknown);
}

#[tokio::test]
async fn test_registry_yaml_drives_a_resync() {
    let fixture = ProjectFixture::new(1, "unused");
    fixture.write("README.md", "# readme");

    let registry_file = fixture.temp_dir.path().join("projects.yaml");
    let yaml = format!(
        "projects:\n  - key: demo\n    root: \"{}\"\ndaemon:\n  debounce_ms: 50\n",
        fixture.root().display()
    );
    fs::write(&registry_file, yaml).unwrap();

    let registry = ProjectRegistry::load(&registry_file).expect("registry should parse");
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.daemon.debounce_ms, 50);

    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(MemoryCatalog::new()) as Arc<dyn CatalogStore>,
    );
    let reports = orchestrator.resync_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "demo");
    // README.md plus the registry file itself land in the catalog.
    assert_eq!(reports[0].1.new, 2);
}

#[tokio::test]
async fn test_snapshot_round_trip_preserves_history() {
    let fixture = ProjectFixture::with_patterns(1, "demo", doc_patterns());
    fixture.write("docs/a.md", "# a");
    fixture.write("docs/b.md", "# b");

    let snapshot = fixture.temp_dir.path().join("state/catalog.ndjson");
    {
        let store = Arc::new(MemoryCatalog::new());
        let orchestrator = Orchestrator::new(
            common::registry_of(&[&fixture]),
            store.clone() as Arc<dyn CatalogStore>,
        );
        orchestrator.resync_project("demo").await.unwrap();

        fixture.remove("docs/b.md");
        orchestrator.resync_project("demo").await.unwrap();
        store.save(&snapshot).unwrap();
    }

    let restored = Arc::new(MemoryCatalog::load(&snapshot).unwrap());
    assert_eq!(restored.len(), 2);
    let deleted = restored.get(1, "docs/b.md").await.unwrap().unwrap();
    assert_eq!(deleted.status, DocumentStatus::Deleted);

    // A resync against the restored catalog recognizes the survivor.
    let orchestrator = Orchestrator::new(
        common::registry_of(&[&fixture]),
        restored as Arc<dyn CatalogStore>,
    );
    let report = orchestrator.resync_project("demo").await.unwrap();
    assert_eq!((report.new, report.unchanged), (0, 1));
}

#[tokio::test]
async fn test_pattern_change_recategorizes_on_next_pass() {
    let fixture = ProjectFixture::new(1, "demo");
    fixture.write("docs/a.md", "# a");

    let store = MemoryCatalog::new();
    let options = ScanOptions::default();

    // Default patterns have no allow list, so markdown lands in unknown.
    let loose = PatternClassifier::from_config(&PatternConfig::default()).unwrap();
    let files = scan(fixture.root(), &loose, &options).unwrap();
    reconcile(&store, 1, &files).await.unwrap();
    let row = store.get(1, "docs/a.md").await.unwrap().unwrap();
    assert_eq!(row.category, MonitorCategory::Unknown);

    let strict = PatternClassifier::from_config(&doc_patterns()).unwrap();
    let files = scan(fixture.root(), &strict, &options).unwrap();
    let report = reconcile(&store, 1, &files).await.unwrap();
    assert_eq!(report.unchanged, 1);

    let row = store.get(1, "docs/a.md").await.unwrap().unwrap();
    assert_eq!(
        row.category,
        MonitorCategory::Allow,
        "category follows current policy, not the stored one"
    );
}
