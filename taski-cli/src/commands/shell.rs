//! `taski shell`: interactive shell in the notes repository, for resolving
//! sync conflicts by hand.

use std::process::Command;

use anyhow::{bail, Context, Result};

use taski_core::paths::notes_dir;

const FALLBACK_SHELL: &str = "/bin/sh";

pub fn run() -> Result<()> {
    let home = super::home_dir()?;
    let repo = notes_dir(&home);
    if !repo.is_dir() {
        bail!("notes directory {} does not exist", repo.display());
    }

    let shell = login_shell(std::env::var("SHELL").ok());
    println!("opening {shell} in {}; exit to return", repo.display());
    let status = Command::new(&shell)
        .current_dir(&repo)
        .status()
        .with_context(|| format!("failed to start {shell}"))?;
    if !status.success() {
        bail!("{shell} exited with {status}");
    }
    Ok(())
}

fn login_shell(env: Option<String>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string())
}
