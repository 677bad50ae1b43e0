//! Daemon tunables.
//!
//! These live under the optional `daemon:` key of the registry file and
//! all fall back to fixed defaults. Component-local constants (hash
//! ceiling, log rotation, crash report retention) stay beside the code
//! that uses them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the daemon orchestrator and its watchers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Consecutive failed watcher starts tolerated per project before
    /// the project is left unwatched (default: 3)
    #[serde(default = "default_max_watcher_retries")]
    pub max_watcher_retries: u32,

    /// First restart delay in milliseconds; doubles per retry
    /// (default: 5000)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Per-path event debounce in milliseconds (default: 300)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Grace period for watcher shutdown in milliseconds
    /// (default: 10000)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Use the polling backend instead of native notifications
    /// (default: false)
    #[serde(default)]
    pub poll_watches: bool,

    /// Polling interval in milliseconds when `poll_watches` is set
    /// (default: 2000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_watcher_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    5000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_watcher_retries: default_max_watcher_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            debounce_ms: default_debounce_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            poll_watches: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DaemonConfig {
    /// Check if this config has default values (for serialization skip)
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
