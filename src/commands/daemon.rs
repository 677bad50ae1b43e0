use std::sync::Arc;

use owo_colors::OwoColorize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use super::print_json;
use crate::catalog::{CatalogStore, MemoryCatalog};
use crate::daemon::{DaemonEvent, Orchestrator};
use crate::error::Result;
use crate::paths;
use crate::project::ProjectRegistry;
use crate::runtime::{
    PidFile, RotatingLogWriter, init_daemon_logging, install_crash_handler, live_daemon_pid,
    signal_stop, spawn_hourly_rotation,
};

/// Run the daemon in the foreground until SIGTERM or SIGINT.
///
/// Acquires the PID file, installs the crash handler, routes logs to
/// the rotating file, brings the orchestrator up, and keeps the catalog
/// snapshot current. Shutdown is bounded: an orchestrator that does not
/// stop within the configured grace period is abandoned and the process
/// exits anyway.
pub async fn cmd_daemon_run() -> Result<()> {
    let pidfile = PidFile::acquire(&paths::pid_file_path())?;
    install_crash_handler(paths::crash_dir());

    let writer = RotatingLogWriter::new(paths::log_file_path())?;
    writer.rotate_if_needed()?;
    init_daemon_logging(&writer)?;
    let rotation = spawn_hourly_rotation(writer);

    tracing::info!(
        "argus daemon {} starting (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );

    let registry = ProjectRegistry::load(&paths::registry_path())?;
    if registry.is_empty() {
        tracing::warn!("no projects registered; daemon will idle");
    }
    let snapshot = paths::snapshot_path();
    let store = Arc::new(MemoryCatalog::load(&snapshot)?);
    tracing::info!("loaded catalog snapshot: {} row(s)", store.len());

    let orchestrator = Orchestrator::new(registry, store.clone() as Arc<dyn CatalogStore>);
    orchestrator.start().await?;

    // Persist after every completed resync so a crash loses at most the
    // live events since the last pass.
    let saver = spawn_snapshot_saver(&orchestrator, store.clone(), snapshot.clone());

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");

    let grace = orchestrator.config().shutdown_timeout();
    if tokio::time::timeout(grace, orchestrator.stop()).await.is_err() {
        tracing::error!("orchestrator did not stop within {grace:?}; forcing exit");
        if let Err(e) = store.save(&snapshot) {
            tracing::warn!("failed to save catalog snapshot: {e}");
        }
        drop(pidfile);
        std::process::exit(1);
    }
    saver.abort();
    rotation.abort();

    if let Err(e) = store.save(&snapshot) {
        tracing::warn!("failed to save catalog snapshot on shutdown: {e}");
    }
    tracing::info!("daemon exited cleanly");
    drop(pidfile);
    Ok(())
}

fn spawn_snapshot_saver(
    orchestrator: &Orchestrator,
    store: Arc<MemoryCatalog>,
    snapshot: std::path::PathBuf,
) -> tokio::task::JoinHandle<()> {
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DaemonEvent::ResyncCompleted { .. }) => {
                    if let Err(e) = store.save(&snapshot) {
                        tracing::warn!("failed to save catalog snapshot: {e}");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("snapshot saver lagged by {n} events");
                }
                Err(RecvError::Closed) => return,
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = term.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Signal the running daemon to shut down.
pub fn cmd_daemon_stop(output_json: bool) -> Result<()> {
    let pid = signal_stop(&paths::pid_file_path())?;
    if output_json {
        return print_json(&json!({ "action": "stop_signaled", "pid": pid }));
    }
    println!("Sent stop signal to daemon (pid {pid}).");
    Ok(())
}

/// Report whether the daemon process is up, from the PID file alone.
pub fn cmd_daemon_status(output_json: bool) -> Result<()> {
    let pid = live_daemon_pid(&paths::pid_file_path());
    if output_json {
        return print_json(&json!({
            "running": pid.is_some(),
            "pid": pid,
            "pid_file": paths::pid_file_path().display().to_string(),
            "log_file": paths::log_file_path().display().to_string(),
        }));
    }
    match pid {
        Some(pid) => println!("Daemon is {} (pid {pid}).", "running".green()),
        None => println!("Daemon is {}.", "stopped".red()),
    }
    println!("  Pid file: {}", paths::pid_file_path().display());
    println!("  Log file: {}", paths::log_file_path().display());
    Ok(())
}
