use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

use argus::commands::{
    cmd_daemon_run, cmd_daemon_status, cmd_daemon_stop, cmd_resync, cmd_scan, cmd_status,
};
use argus::runtime::init_cli_logging;

#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "Filesystem document catalog with live synchronization")]
#[command(version)]
struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and manage the sync daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Scan and reconcile projects against the catalog
    Resync {
        /// Project key (all valid projects when omitted)
        key: Option<String>,
    },

    /// Classify and list the trackable files under a directory
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Leave out files matching neither allow nor deny patterns
        #[arg(long)]
        skip_unknown: bool,
    },

    /// Show registered projects and catalog totals
    Status,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Run the daemon in the foreground
    Run,
    /// Signal a running daemon to stop
    Stop,
    /// Show whether the daemon process is up
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The daemon routes tracing to its rotating log file instead.
    if !matches!(
        cli.command,
        Commands::Daemon {
            action: DaemonAction::Run
        }
    ) {
        init_cli_logging();
    }

    let result = match cli.command {
        Commands::Daemon { action } => match action {
            DaemonAction::Run => cmd_daemon_run().await,
            DaemonAction::Stop => cmd_daemon_stop(cli.json),
            DaemonAction::Status => cmd_daemon_status(cli.json),
        },

        Commands::Resync { key } => cmd_resync(key.as_deref(), cli.json).await,

        Commands::Scan { path, skip_unknown } => cmd_scan(&path, skip_unknown, cli.json),

        Commands::Status => cmd_status(cli.json).await,

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "argus", &mut std::io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
