//! Error types for taski-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a version-control step.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The `git` executable could not be spawned.
    #[error("git: command not found")]
    NotFound,

    /// `git` ran and exited non-zero.
    #[error("git {args} failed ({status})")]
    Failed {
        args: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    /// Spawning or waiting on `git` failed for another reason.
    #[error("I/O error running git in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking task running a cycle panicked or was cancelled.
    #[error("sync task join error: {0}")]
    Join(String),
}

impl VcsError {
    /// Build a [`VcsError::Failed`] with an empty stdout.
    pub fn failed(args: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Failed {
            args: args.into(),
            status: "exit status: 1".to_string(),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Message plus captured stderr; the text the classifier inspects.
    pub fn diagnostic_text(&self) -> String {
        match self {
            Self::Failed { stderr, .. } if !stderr.is_empty() => format!("{self}\n{stderr}"),
            _ => self.to_string(),
        }
    }
}

/// Errors from talking to the orchestrator through a [`crate::SyncHandle`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The orchestrator task has exited.
    #[error("sync orchestrator is not running")]
    Stopped,

    /// The orchestrator dropped a reply channel.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> VcsError {
    VcsError::Io {
        path: path.into(),
        source,
    }
}
