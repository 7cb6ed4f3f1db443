//! One synchronization cycle: commit local changes, rebase, push.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::classify::{classify, FailureClass};
use crate::error::VcsError;
use crate::vcs::VcsClient;

/// Commit message for automatic commits, stamped with local date and time.
pub fn commit_message(now: DateTime<Local>) -> String {
    format!("taski: 自動同期 {}", now.format("%Y-%m-%d %H:%M"))
}

/// What a successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// `Some(message)` when local changes were committed.
    pub committed: Option<String>,
}

/// Run status → (add + commit) → pull --rebase → push, stopping at the first
/// failing step.
pub fn run_cycle(vcs: &dyn VcsClient, now: DateTime<Local>) -> Result<CycleReport, VcsError> {
    let status = vcs.status()?;
    let committed = if status.trim().is_empty() {
        None
    } else {
        let message = commit_message(now);
        vcs.stage_all()?;
        vcs.commit(&message)?;
        tracing::info!("committed local changes: {}", message);
        Some(message)
    };

    vcs.pull_rebase()?;
    vcs.push()?;
    Ok(CycleReport { committed })
}

/// Result of [`sync_once`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Synced(CycleReport),
    Failed {
        class: FailureClass,
        diagnostics: String,
        /// Only attempted for conflicts.
        rebase_aborted: bool,
    },
}

/// Run a cycle and classify its failure. On conflict the in-progress rebase
/// is aborted; an abort failure is ignored.
pub fn sync_once(vcs: &dyn VcsClient, now: DateTime<Local>) -> CycleOutcome {
    match run_cycle(vcs, now) {
        Ok(report) => CycleOutcome::Synced(report),
        Err(err) => failed_outcome(vcs, &err),
    }
}

fn failed_outcome(vcs: &dyn VcsClient, err: &VcsError) -> CycleOutcome {
    let diagnostics = err.diagnostic_text();
    let class = classify(&diagnostics);
    let rebase_aborted = class == FailureClass::Conflict && vcs.abort_rebase().is_ok();
    CycleOutcome::Failed {
        class,
        diagnostics,
        rebase_aborted,
    }
}
