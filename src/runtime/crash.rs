//! Crash reports for the daemon process.
//!
//! A panic anywhere in the daemon writes a timestamped JSON report and
//! exits. Recovery is the supervisor's job, not ours; in-process
//! self-healing for unknown failure classes hides more than it fixes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reports beyond the most recent this many are pruned.
pub const MAX_CRASH_REPORTS: usize = 10;

const REPORT_PREFIX: &str = "crash-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashReport {
    pub time: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub pid: u32,
    pub message: String,
    pub backtrace: String,
}

impl CrashReport {
    pub fn new(message: String, backtrace: String) -> Self {
        Self {
            time: jiff::Timestamp::now()
                .strftime("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            message,
            backtrace,
        }
    }
}

/// Install a panic hook that writes a crash report under `crash_dir`
/// and terminates the process with a nonzero exit code.
///
/// The hook never panics itself: report IO failures fall back to
/// stderr so the crash is visible somewhere no matter what.
pub fn install_crash_handler(crash_dir: PathBuf) {
    std::panic::set_hook(Box::new(move |info| {
        let message = panic_message(info);
        let backtrace = std::backtrace::Backtrace::force_capture().to_string();
        let report = CrashReport::new(message, backtrace);

        match write_crash_report(&crash_dir, &report) {
            Ok(path) => {
                eprintln!("argus crashed: {}", report.message);
                eprintln!("crash report written to {}", path.display());
            }
            Err(e) => {
                eprintln!("argus crashed: {}", report.message);
                eprintln!("failed to write crash report: {e}");
                eprintln!("{}", report.backtrace);
            }
        }
        if let Err(e) = prune_crash_reports(&crash_dir, MAX_CRASH_REPORTS) {
            eprintln!("failed to prune crash reports: {e}");
        }

        std::process::exit(70);
    }));
}

fn panic_message(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    match info.location() {
        Some(location) => format!("{payload} (at {location})"),
        None => payload,
    }
}

/// Write one report as pretty JSON, named so reports sort by time.
pub fn write_crash_report(dir: &Path, report: &CrashReport) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stamp = jiff::Timestamp::now()
        .strftime("%Y%m%d-%H%M%S%.3f")
        .to_string();
    let mut path = dir.join(format!("{REPORT_PREFIX}{stamp}.json"));
    // Two crashes in the same millisecond should not clobber each other.
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{REPORT_PREFIX}{stamp}-{counter}.json"));
        counter += 1;
    }
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Keep the `keep` most recent reports, delete the rest. Report names
/// embed their timestamp, so lexicographic order is chronological.
pub fn prune_crash_reports(dir: &Path, keep: usize) -> io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut reports: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(REPORT_PREFIX) && name.ends_with(".json"))
        })
        .collect();
    reports.sort();

    let mut removed = 0;
    if reports.len() > keep {
        for stale in &reports[..reports.len() - keep] {
            fs::remove_file(stale)?;
            removed += 1;
        }
    }
    Ok(removed)
}
