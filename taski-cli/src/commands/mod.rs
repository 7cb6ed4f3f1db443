pub mod agenda;
pub mod daemon;
pub mod shell;
pub mod sync;
pub mod tags;
pub mod today;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use taski_core::{config, scan};

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Every note under the configured roots, read into lines.
pub fn load_notes(home: &Path) -> Result<Vec<(PathBuf, Vec<String>)>> {
    let config = config::load_at(home).context("failed to load ~/.taski/config.yaml")?;
    let files = scan::discover_notes_at(home, &config).context("failed to scan note directories")?;
    scan::load_documents(&files).context("failed to read notes")
}

/// `~/...` for paths under home, otherwise the full path.
pub fn display_path(home: &Path, path: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(relative) => format!("~/{}", relative.display()),
        Err(_) => path.display().to_string(),
    }
}

pub fn checkbox(completed: bool) -> &'static str {
    if completed {
        "[x]"
    } else {
        "[ ]"
    }
}
