//! Orchestrator notifications and the bounded diagnostic log.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::state::SyncState;

/// Lines kept in the diagnostic ring.
pub const DIAGNOSTIC_CAPACITY: usize = 500;

/// Recovery paths offered when a conflict stops synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Open a shell in the repository to resolve by hand.
    OpenTerminal,
    /// Re-run the start preconditions and sync again.
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    StateChanged {
        state: SyncState,
    },
    Log {
        line: String,
    },
    ConflictDetected {
        repo: PathBuf,
        diagnostics: String,
        actions: Vec<RecoveryAction>,
    },
}

/// Append-only diagnostic lines, oldest dropped past [`DIAGNOSTIC_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl DiagnosticLog {
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == DIAGNOSTIC_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect()
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}

/// Writer side used by the orchestrator: ring, broadcast, and `log` records.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    events: broadcast::Sender<SyncEvent>,
    log: DiagnosticLog,
}

impl EventSink {
    pub(crate) fn new(events: broadcast::Sender<SyncEvent>, log: DiagnosticLog) -> Self {
        Self { events, log }
    }

    pub(crate) fn info(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!("{}", line);
        self.append(line);
    }

    pub(crate) fn warn(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::warn!("{}", line);
        self.append(line);
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.log.snapshot()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn append(&self, line: String) {
        let stamped = format!("[{}] {}", Local::now().format("%H:%M:%S"), line);
        self.log.push(stamped.clone());
        self.emit(SyncEvent::Log { line: stamped });
    }
}
