//! `taski sync`: one commit / rebase / push cycle.
//!
//! Goes through the daemon when one is running so the cycle respects its
//! single-flight rule; otherwise runs in-process.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use taski_core::paths::{notes_dir, REPO_METADATA_DIR};
use taski_daemon::{request_sync, DaemonError};
use taski_sync::{sync_once, CycleOutcome, FailureClass, GitCli};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Run in this process even if the daemon is running.
    #[arg(long)]
    pub once: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;

        if !self.once {
            match request_sync(&home) {
                Ok(data) => return print_daemon_outcome(&data),
                Err(DaemonError::DaemonNotRunning { .. }) => {
                    println!("{}", "daemon is not running; syncing in-process".bright_black());
                }
                Err(err) => return Err(err).context("daemon sync request failed"),
            }
        }

        let repo = notes_dir(&home);
        if !repo.join(REPO_METADATA_DIR).exists() {
            bail!("{} is not a git repository", repo.display());
        }
        let outcome = sync_once(&GitCli::new(&repo), Local::now());
        print_cycle_outcome(&outcome)
    }
}

fn print_cycle_outcome(outcome: &CycleOutcome) -> Result<()> {
    match outcome {
        CycleOutcome::Synced(report) => {
            match &report.committed {
                Some(message) => println!("{} {}", "committed".green(), message),
                None => println!("{}", "nothing to commit".bright_black()),
            }
            println!("{}", "synced".green().bold());
            Ok(())
        }
        CycleOutcome::Failed {
            class,
            diagnostics,
            rebase_aborted,
        } => {
            eprintln!("{}", diagnostics.trim_end());
            if *rebase_aborted {
                eprintln!("{}", "rebase aborted; working tree restored".yellow());
            }
            if *class == FailureClass::Conflict {
                eprintln!("resolve the conflict with `taski shell`, then run `taski sync` again");
            }
            bail!("sync failed ({})", class.as_str())
        }
    }
}

fn print_daemon_outcome(data: &Value) -> Result<()> {
    match data["result"].as_str() {
        Some("finished") => {
            let outcome = &data["outcome"];
            if outcome["outcome"] == "synced" {
                match outcome["committed"].as_str() {
                    Some(message) => println!("{} {}", "committed".green(), message),
                    None => println!("{}", "nothing to commit".bright_black()),
                }
                println!("{}", "synced".green().bold());
                return Ok(());
            }
            let class = outcome["class"].as_str().unwrap_or("other");
            if let Some(diagnostics) = outcome["diagnostics"].as_str() {
                eprintln!("{}", diagnostics.trim_end());
            }
            if class == "conflict" {
                eprintln!("resolve the conflict with `taski shell`, then run `taski daemon retry`");
            }
            bail!("sync failed ({class})")
        }
        Some("dropped") => {
            println!("another sync is still running; nothing started");
            Ok(())
        }
        Some("conflict") => {
            if let Some(lines) = data["diagnostics"].as_array() {
                for line in lines.iter().filter_map(Value::as_str) {
                    eprintln!("{line}");
                }
            }
            bail!("sync is stopped on a conflict; resolve it with `taski shell`, then run `taski daemon retry`")
        }
        Some("disabled") => {
            println!("automatic sync is disabled; run `taski daemon retry` or `taski sync --once`");
            Ok(())
        }
        _ => bail!("unexpected daemon sync response: {data}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taski_sync::CycleReport;

    #[test]
    fn daemon_success_and_drop_are_ok() {
        let synced = json!({
            "result": "finished",
            "state": "idle",
            "outcome": {"outcome": "synced", "committed": null},
        });
        assert!(print_daemon_outcome(&synced).is_ok());
        assert!(print_daemon_outcome(&json!({"result": "dropped"})).is_ok());
    }

    #[test]
    fn daemon_failures_are_errors() {
        let failed = json!({
            "result": "finished",
            "state": "idle",
            "outcome": {"outcome": "failed", "class": "network", "diagnostics": "x", "rebase_aborted": false},
        });
        let err = print_daemon_outcome(&failed).unwrap_err();
        assert_eq!(err.to_string(), "sync failed (network)");
        assert!(print_daemon_outcome(&json!({"result": "conflict", "diagnostics": []})).is_err());
        assert!(print_daemon_outcome(&json!({"result": "?"})).is_err());
    }

    #[test]
    fn in_process_failure_names_the_class() {
        let ok = CycleOutcome::Synced(CycleReport { committed: None });
        assert!(print_cycle_outcome(&ok).is_ok());
        let failed = CycleOutcome::Failed {
            class: FailureClass::Conflict,
            diagnostics: "CONFLICT".to_string(),
            rebase_aborted: true,
        };
        assert_eq!(print_cycle_outcome(&failed).unwrap_err().to_string(), "sync failed (conflict)");
    }
}
