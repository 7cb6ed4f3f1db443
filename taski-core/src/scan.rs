//! Markdown note discovery under the notes directory and any extra roots.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::TaskiConfig;
use crate::error::{io_err, CoreError};
use crate::paths::notes_dir;

const SKIPPED_DIR: &str = "node_modules";

/// Translate an exclude glob into an unanchored regex.
///
/// `**` matches across separators, `*` within one path segment; everything
/// else is literal.
pub fn glob_to_regex(pattern: &str) -> String {
    pattern
        .split("**")
        .map(|part| {
            part.split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("[^/]*")
        })
        .collect::<Vec<_>>()
        .join(".*")
}

/// Compiled `exclude_directories` patterns.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Regex>,
}

impl ExcludeSet {
    pub fn new(globs: &[String]) -> Result<Self, CoreError> {
        let mut patterns = Vec::with_capacity(globs.len());
        for glob in globs {
            let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| CoreError::Pattern {
                pattern: glob.clone(),
                source,
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.patterns.iter().any(|re| re.is_match(&text))
    }
}

/// Recursively collect `*.md` files under `dir`, sorted per directory.
pub fn find_markdown_files(dir: &Path, exclude: &ExcludeSet) -> Result<Vec<PathBuf>, CoreError> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries: Vec<_> = std::fs::read_dir(&current)
            .map_err(|e| io_err(&current, e))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let path = entry.path();
            let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
            if ty.is_dir() {
                if entry.file_name() == SKIPPED_DIR || exclude.matches(&path) {
                    continue;
                }
                subdirs.push(path);
            } else if ty.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some("md")
                && !exclude.matches(&path)
            {
                found.push(path);
            }
        }
        // Reverse so the stack pops subdirectories in name order.
        pending.extend(subdirs.into_iter().rev());
    }

    Ok(found)
}

/// All notes under `~/taski` and the configured additional directories.
///
/// Roots that do not exist are skipped; duplicates keep their first position.
pub fn discover_notes_at(home: &Path, config: &TaskiConfig) -> Result<Vec<PathBuf>, CoreError> {
    let exclude = ExcludeSet::new(&config.exclude_directories)?;
    let mut roots = vec![notes_dir(home)];
    roots.extend(config.additional_directories.iter().cloned());

    let mut seen = HashSet::new();
    let mut notes = Vec::new();
    for root in roots {
        let files = match find_markdown_files(&root, &exclude) {
            Ok(files) => files,
            Err(CoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::debug!("skipping missing notes root: {}", root.display());
                continue;
            }
            Err(err) => return Err(err),
        };
        for file in files {
            if seen.insert(file.clone()) {
                notes.push(file);
            }
        }
    }
    Ok(notes)
}

/// Read a note into lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    // A byte-order mark would hide a marker on the first line.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_str());
    Ok(text.lines().map(str::to_owned).collect())
}

/// Read every note in `paths`, keeping order.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Vec<String>)>, CoreError> {
    paths
        .iter()
        .map(|path| Ok((path.clone(), read_lines(path)?)))
        .collect()
}
