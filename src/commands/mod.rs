//! CLI command implementations.
//!
//! Each `cmd_*` function owns one subcommand end to end: load what it
//! needs, do the work, print human or JSON output.

mod daemon;
mod resync;
mod scan;
mod status;

pub use daemon::{cmd_daemon_run, cmd_daemon_status, cmd_daemon_stop};
pub use resync::cmd_resync;
pub use scan::cmd_scan;
pub use status::cmd_status;

use serde::Serialize;

use crate::error::Result;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
