//! Daemon PID file bookkeeping.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ArgusError, Result};

/// Exclusive claim on the daemon role, backed by a PID file.
///
/// The file is removed on drop. A leftover file naming a dead process
/// is stale and gets replaced, so an unclean shutdown does not wedge
/// the next start.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim the PID file, failing if another live process holds it.
    pub fn acquire(path: &Path) -> Result<PidFile> {
        if let Some(pid) = read_pid(path) {
            if process_alive(pid) {
                return Err(ArgusError::AlreadyRunning(pid));
            }
            tracing::info!("removing stale pid file left by dead process {pid}");
            fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, std::process::id().to_string())?;
        Ok(PidFile {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove pid file: {e}");
            }
        }
    }
}

/// Read and parse a PID file. Missing or malformed files read as None.
pub fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

/// The running daemon's PID, if the PID file names a live process.
pub fn live_daemon_pid(path: &Path) -> Option<u32> {
    read_pid(path).filter(|pid| process_alive(*pid))
}

/// Ask the daemon holding `path` to shut down (SIGTERM).
pub fn signal_stop(path: &Path) -> Result<u32> {
    let pid = live_daemon_pid(path).ok_or(ArgusError::NotRunning)?;
    send_term(pid)?;
    Ok(pid)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 checks existence without delivering anything. EPERM
    // still means the process exists, just under another user.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_term(pid: u32) -> Result<()> {
    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_term(_pid: u32) -> Result<()> {
    Err(ArgusError::Config(
        "stopping the daemon is only supported on unix".to_string(),
    ))
}
