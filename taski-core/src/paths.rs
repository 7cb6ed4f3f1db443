//! Conventional per-user locations.
//!
//! ```text
//! ~/taski/              notes repository (synchronized)
//! ~/.taski/
//!   config.yaml         settings (mode 0600)
//!   daemon.sock         control socket of the running daemon
//! ```
//!
//! Every function takes `home` explicitly; tests pass a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

pub const NOTES_DIR: &str = "taski";
pub const TASKI_ROOT: &str = ".taski";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DAEMON_SOCKET: &str = "daemon.sock";

/// Metadata folder whose presence marks the notes dir as a git repository.
pub const REPO_METADATA_DIR: &str = ".git";

pub fn notes_dir(home: &Path) -> PathBuf {
    home.join(NOTES_DIR)
}

pub fn taski_root(home: &Path) -> PathBuf {
    home.join(TASKI_ROOT)
}

pub fn config_path(home: &Path) -> PathBuf {
    taski_root(home).join(CONFIG_FILE)
}

pub fn socket_path(home: &Path) -> PathBuf {
    taski_root(home).join(DAEMON_SOCKET)
}

/// `dirs::home_dir()` or [`CoreError::HomeNotFound`].
pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}
