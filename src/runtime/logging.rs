//! Rotating log file for the daemon process.
//!
//! Writes append to one active file. Rotation is checked at startup
//! and from an hourly timer, not on every write, so the active file
//! can overshoot the threshold by whatever accumulates within an hour.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::error::{ArgusError, Result};

/// Rotation trigger size for the active log file.
pub const ROTATE_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated files beyond the most recent this many are pruned.
pub const MAX_ROTATED_LOGS: usize = 5;

/// Append-only log writer whose backing file can be swapped out
/// underneath concurrent writers. Clones share one file handle.
#[derive(Clone)]
pub struct RotatingLogWriter {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    threshold: u64,
    max_rotated: usize,
    file: Mutex<File>,
}

impl RotatingLogWriter {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_limits(path, ROTATE_THRESHOLD_BYTES, MAX_ROTATED_LOGS)
    }

    pub fn with_limits(path: PathBuf, threshold: u64, max_rotated: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                threshold,
                max_rotated,
                file: Mutex::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Rename the active file aside and start a fresh one when it has
    /// outgrown the threshold. Returns whether a rotation happened.
    pub fn rotate_if_needed(&self) -> Result<bool> {
        let mut file = self.inner.file.lock();
        if file.metadata()?.len() < self.inner.threshold {
            return Ok(false);
        }

        file.flush()?;
        fs::rename(&self.inner.path, self.rotation_target())?;
        *file = open_append(&self.inner.path)?;
        drop(file);

        self.prune_rotated()?;
        Ok(true)
    }

    /// Timestamped sibling of the active file, with a numeric suffix
    /// when two rotations land in the same millisecond.
    fn rotation_target(&self) -> PathBuf {
        let stamp = jiff::Timestamp::now()
            .strftime("%Y%m%d-%H%M%S%.3f")
            .to_string();
        let name = self.file_name();
        let dir = self.parent_dir();
        let mut target = dir.join(format!("{name}.{stamp}"));
        let mut counter = 1;
        while target.exists() {
            target = dir.join(format!("{name}.{stamp}-{counter}"));
            counter += 1;
        }
        target
    }

    /// Rotated names embed their timestamp, so lexicographic order is
    /// chronological and pruning drops the head of the sorted list.
    fn prune_rotated(&self) -> Result<usize> {
        let prefix = format!("{}.", self.file_name());
        let mut rotated: Vec<PathBuf> = fs::read_dir(self.parent_dir())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();
        rotated.sort();

        let mut removed = 0;
        if rotated.len() > self.inner.max_rotated {
            for stale in &rotated[..rotated.len() - self.inner.max_rotated] {
                fs::remove_file(stale)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn file_name(&self) -> String {
        self.inner
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "argus.log".to_string())
    }

    fn parent_dir(&self) -> &Path {
        self.inner.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.file.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.file.lock().flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Route all tracing output to the rotating log file.
///
/// `RUST_LOG` overrides the default `info` filter. ANSI escapes are
/// off since nothing human-facing reads this file live.
pub fn init_daemon_logging(writer: &RotatingLogWriter) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sink = writer.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .try_init()
        .map_err(|e| ArgusError::Config(format!("failed to initialize logging: {e}")))
}

/// Stderr logging for one-shot CLI commands; warnings only unless
/// `RUST_LOG` says otherwise.
pub fn init_cli_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Check the rotation threshold once an hour for as long as the
/// daemon runs.
pub fn spawn_hourly_rotation(writer: RotatingLogWriter) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        // The first tick completes immediately; startup already checked.
        interval.tick().await;
        loop {
            interval.tick().await;
            match writer.rotate_if_needed() {
                Ok(true) => tracing::info!("log file rotated"),
                Ok(false) => {}
                Err(e) => tracing::warn!("log rotation failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fill(writer: &RotatingLogWriter, bytes: usize) {
        let mut sink = writer.clone();
        sink.write_all(&vec![b'x'; bytes]).unwrap();
        sink.flush().unwrap();
    }

    fn rotated_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("argus.log."))
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_small_log_does_not_rotate() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let writer =
            RotatingLogWriter::with_limits(tmp.path().join("argus.log"), 64, 5).unwrap();

        fill(&writer, 10);
        assert!(!writer.rotate_if_needed().unwrap());
        assert!(rotated_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_oversized_log_rotates_exactly_once() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let writer =
            RotatingLogWriter::with_limits(tmp.path().join("argus.log"), 64, 5).unwrap();

        fill(&writer, 100);
        assert!(writer.rotate_if_needed().unwrap());
        assert_eq!(rotated_files(tmp.path()).len(), 1);

        // The fresh active file is below threshold, so an immediate
        // second check is a no-op.
        assert!(!writer.rotate_if_needed().unwrap());
        assert_eq!(rotated_files(tmp.path()).len(), 1);
        assert_eq!(fs::metadata(writer.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_writes_land_in_fresh_file_after_rotation() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let writer =
            RotatingLogWriter::with_limits(tmp.path().join("argus.log"), 64, 5).unwrap();

        fill(&writer, 100);
        writer.rotate_if_needed().unwrap();
        fill(&writer, 5);

        assert_eq!(fs::metadata(writer.path()).unwrap().len(), 5);
        let rotated = rotated_files(tmp.path());
        assert_eq!(fs::metadata(&rotated[0]).unwrap().len(), 100);
    }

    #[test]
    fn test_old_rotations_are_pruned() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let writer =
            RotatingLogWriter::with_limits(tmp.path().join("argus.log"), 64, 2).unwrap();

        for _ in 0..4 {
            fill(&writer, 100);
            assert!(writer.rotate_if_needed().unwrap());
        }
        assert_eq!(rotated_files(tmp.path()).len(), 2);
    }
}
