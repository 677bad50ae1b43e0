//! Process-level reliability for the daemon host: crash reports, log
//! rotation, and PID file bookkeeping.

pub mod crash;
pub mod logging;
pub mod pidfile;

pub use crash::{CrashReport, MAX_CRASH_REPORTS, install_crash_handler, prune_crash_reports};
pub use logging::{
    MAX_ROTATED_LOGS, ROTATE_THRESHOLD_BYTES, RotatingLogWriter, init_cli_logging,
    init_daemon_logging, spawn_hourly_rotation,
};
pub use pidfile::{PidFile, live_daemon_pid, read_pid, signal_stop};
