//! Orchestrator lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    /// Waiting for the user to resolve a rebase conflict.
    Conflict,
    Disabled,
}

impl SyncState {
    /// `true` while periodic and save-driven triggers are honoured.
    pub fn is_active(self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Syncing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Conflict => "conflict",
            SyncState::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&SyncState::Conflict).expect("serialize");
        assert_eq!(json, "\"conflict\"");
        assert_eq!(SyncState::Syncing.to_string(), "syncing");
    }

    #[test]
    fn only_idle_and_syncing_are_active() {
        assert!(SyncState::Idle.is_active());
        assert!(SyncState::Syncing.is_active());
        assert!(!SyncState::Conflict.is_active());
        assert!(!SyncState::Disabled.is_active());
    }
}
