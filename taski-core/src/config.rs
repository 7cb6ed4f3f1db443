//! User settings stored in `~/.taski/config.yaml`.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::paths::{config_path, home, taski_root};

/// Default periodic sync cadence in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Configured intervals below this are raised to it.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 30;

/// Settings consumed by the scanner and the sync orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskiConfig {
    /// Gates whether automatic git synchronization starts at all.
    pub git_auto_sync: bool,
    /// Periodic sync cadence in seconds (floored at use).
    pub git_sync_interval: u64,
    /// Extra directories scanned for notes besides `~/taski`.
    pub additional_directories: Vec<PathBuf>,
    /// Glob patterns (`**`, `*`) excluded from scanning.
    pub exclude_directories: Vec<String>,
}

impl Default for TaskiConfig {
    fn default() -> Self {
        Self {
            git_auto_sync: true,
            git_sync_interval: DEFAULT_SYNC_INTERVAL_SECS,
            additional_directories: Vec::new(),
            exclude_directories: Vec::new(),
        }
    }
}

impl TaskiConfig {
    /// Configured interval with the floor applied.
    pub fn sync_interval(&self) -> Duration {
        clamp_interval(self.git_sync_interval)
    }
}

/// Raise `secs` to [`MIN_SYNC_INTERVAL_SECS`] if below it.
pub fn clamp_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.max(MIN_SYNC_INTERVAL_SECS))
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings; a missing or empty file yields the defaults.
pub fn load_at(home: &Path) -> Result<TaskiConfig, CoreError> {
    let path = config_path(home);
    if !path.exists() {
        return Ok(TaskiConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(TaskiConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<TaskiConfig, CoreError> {
    load_at(&home()?)
}

/// Atomically write settings: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &TaskiConfig) -> Result<(), CoreError> {
    let root = taski_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    let path = config_path(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &TaskiConfig) -> Result<(), CoreError> {
    save_at(&home()?, config)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, TaskiConfig::default());
        assert!(config.git_auto_sync);
        assert_eq!(config.git_sync_interval, 30);
    }

    #[test]
    fn interval_floor_is_applied() {
        let config = TaskiConfig {
            git_sync_interval: 5,
            ..TaskiConfig::default()
        };
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(clamp_interval(120), Duration::from_secs(120));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let home = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(taski_root(home.path())).expect("mkdir");
        std::fs::write(config_path(home.path()), "git_sync_interval: 90\n").expect("write");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config.git_sync_interval, 90);
        assert!(config.git_auto_sync);
    }

    #[test]
    fn save_then_load_roundtrip_and_tmp_removed() {
        let home = TempDir::new().expect("tempdir");
        let config = TaskiConfig {
            git_auto_sync: false,
            exclude_directories: vec!["**/archive/**".to_string()],
            ..TaskiConfig::default()
        };
        save_at(home.path(), &config).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), config);
        assert!(!config_path(home.path()).with_file_name("config.yaml.tmp").exists());
    }

    #[test]
    fn saved_file_is_private() {
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &TaskiConfig::default()).expect("save");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config_path(home.path()))
                .expect("metadata")
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600);
        }
    }
}
