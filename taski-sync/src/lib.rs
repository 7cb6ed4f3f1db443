//! # taski-sync
//!
//! Automatic git synchronization of the notes repository.
//!
//! [`spawn`] starts the orchestrator actor and returns a [`SyncHandle`]; the
//! handle exposes `start`, `stop` and `sync_now`, plus the inputs the daemon
//! feeds it (saves, config changes). [`sync_once`] runs a single classified
//! cycle without the orchestrator.
//!
//! The `testing` feature exposes a scripted [`VcsClient`] for downstream tests.

pub mod classify;
pub mod cycle;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod timer;
pub mod vcs;

pub use classify::{classify, FailureClass};
pub use cycle::{commit_message, run_cycle, sync_once, CycleOutcome, CycleReport};
pub use error::{SyncError, VcsError};
pub use event::{DiagnosticLog, RecoveryAction, SyncEvent};
pub use orchestrator::{spawn, SyncHandle, SyncNowOutcome, SyncSettings, DEBOUNCE_WINDOW};
pub use state::SyncState;
pub use vcs::{GitCli, VcsClient};
