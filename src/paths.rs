use std::path::PathBuf;

/// Returns the runtime directory for daemon state (pid file, logs,
/// crash reports, catalog snapshot).
///
/// Resolution order:
/// 1. `ARGUS_RUNTIME_DIR` environment variable (if set)
/// 2. Platform data directory via `directories`
/// 3. `.argus-runtime` under the current working directory
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ARGUS_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("dev", "argus", "argus")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".argus-runtime"))
}

/// Returns the registry file path.
///
/// Resolution order:
/// 1. `ARGUS_REGISTRY` environment variable (if set)
/// 2. Platform config directory via `directories`
/// 3. `.argus-runtime/projects.yaml` under the current working directory
pub fn registry_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARGUS_REGISTRY") {
        return PathBuf::from(path);
    }
    directories::ProjectDirs::from("dev", "argus", "argus")
        .map(|dirs| dirs.config_dir().join("projects.yaml"))
        .unwrap_or_else(|| PathBuf::from(".argus-runtime/projects.yaml"))
}

/// Returns the path to the daemon pid file.
pub fn pid_file_path() -> PathBuf {
    runtime_dir().join("argus.pid")
}

/// Returns the path to the active daemon log file.
pub fn log_file_path() -> PathBuf {
    runtime_dir().join("argus.log")
}

/// Returns the directory holding crash reports.
pub fn crash_dir() -> PathBuf {
    runtime_dir().join("crashes")
}

/// Returns the path to the catalog snapshot.
pub fn snapshot_path() -> PathBuf {
    runtime_dir().join("catalog.ndjson")
}
