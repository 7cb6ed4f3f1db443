//! `taski daemon`: background sync daemon lifecycle.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use taski_core::paths::socket_path;
use taski_daemon::{
    request_log, request_shutdown, request_start, request_status, request_stop, start_blocking,
    DaemonError,
};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (watcher + sync + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Print recent sync diagnostic lines.
    Logs(DaemonLogsArgs),
    /// Re-check the repository and resume automatic sync (after a conflict).
    Retry,
    /// Pause automatic sync; the daemon keeps running.
    Pause,
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 50)]
    pub lines: usize,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_shutdown(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::Logs(args) => match request_log(&home, args.lines) {
            Ok(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("failed to read daemon log"),
        },
        DaemonCommand::Retry => {
            let data = request_start(&home).context("failed to restart sync")?;
            let state = data["state"].as_str().unwrap_or("unknown");
            if state == "disabled" {
                println!(
                    "{} sync could not start; see `taski daemon logs`",
                    state.yellow()
                );
            } else {
                println!("sync {}", state.green());
            }
        }
        DaemonCommand::Pause => {
            request_stop(&home).context("failed to pause sync")?;
            println!("automatic sync paused; resume with `taski daemon retry`");
        }
    }

    Ok(())
}
