//! Version-control client seam and its `git` subprocess implementation.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, VcsError};

/// Operations one sync cycle needs from the repository.
///
/// Calls block; the orchestrator runs them on tokio's blocking pool.
pub trait VcsClient: Send + Sync {
    /// Porcelain status output; non-empty after trimming means dirty.
    fn status(&self) -> Result<String, VcsError>;
    fn stage_all(&self) -> Result<(), VcsError>;
    fn commit(&self, message: &str) -> Result<(), VcsError>;
    fn pull_rebase(&self) -> Result<(), VcsError>;
    fn push(&self) -> Result<(), VcsError>;
    fn abort_rebase(&self) -> Result<(), VcsError>;
}

/// Shells out to `git` with the repository as working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    program: OsString,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self::with_program(repo, "git")
    }

    /// Use a different executable name or path in place of `git`.
    pub fn with_program(repo: impl Into<PathBuf>, program: impl Into<OsString>) -> Self {
        Self {
            repo: repo.into(),
            program: program.into(),
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo)
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => VcsError::NotFound,
                _ => io_err(&self.repo, err),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        Err(VcsError::Failed {
            args: args.join(" "),
            status: output.status.to_string(),
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl VcsClient for GitCli {
    fn status(&self) -> Result<String, VcsError> {
        self.run(&["status", "--porcelain"])
    }

    fn stage_all(&self) -> Result<(), VcsError> {
        self.run(&["add", "-A"]).map(drop)
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.run(&["commit", "-m", message]).map(drop)
    }

    fn pull_rebase(&self) -> Result<(), VcsError> {
        self.run(&["pull", "--rebase"]).map(drop)
    }

    fn push(&self) -> Result<(), VcsError> {
        self.run(&["push"]).map(drop)
    }

    fn abort_rebase(&self) -> Result<(), VcsError> {
        self.run(&["rebase", "--abort"]).map(drop)
    }
}
