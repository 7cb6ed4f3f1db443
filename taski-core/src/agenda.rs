//! Date-grouped views over parsed task records.
//!
//! Section order:
//! 1. today: every task, completed included, with a `done/total` count
//! 2. other dates, newest first: only dates with an incomplete task, and only
//!    the incomplete tasks within them
//! 3. undated: same incomplete-only rule
//!
//! Inside a file group, incomplete tasks are listed before completed ones.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::parser::extract_for_date;
use crate::types::{DatedTaskRecord, ParsedTaskRecord};

/// Local calendar date as `YYYY-MM-DD`.
pub fn local_date_string(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// `local_date_string` for the current instant.
pub fn today() -> String {
    local_date_string(Local::now())
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which bucket a section represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "date", rename_all = "lowercase")]
pub enum SectionKey {
    Today(String),
    Date(String),
    Undated,
}

/// A task row inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaTask {
    pub completed: bool,
    pub text: String,
    pub source_line: usize,
    pub log: String,
}

/// Tasks of one file inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroup {
    pub file: PathBuf,
    pub tasks: Vec<AgendaTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaSection {
    pub key: SectionKey,
    pub files: Vec<FileGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Group per-file all-dates records into agenda sections relative to `today`.
pub fn build(files: &[(PathBuf, Vec<ParsedTaskRecord>)], today: &str) -> Vec<AgendaSection> {
    let mut by_date: BTreeMap<String, Vec<FileGroup>> = BTreeMap::new();

    for (file, records) in files {
        let mut per_date: Vec<(String, Vec<AgendaTask>)> = Vec::new();
        for record in records {
            let task = AgendaTask {
                completed: record.completed,
                text: record.text.clone(),
                source_line: record.source_line,
                log: record.log.clone(),
            };
            match per_date.iter_mut().find(|(date, _)| *date == record.date) {
                Some((_, tasks)) => tasks.push(task),
                None => per_date.push((record.date.clone(), vec![task])),
            }
        }
        for (date, tasks) in per_date {
            by_date.entry(date).or_default().push(FileGroup {
                file: file.clone(),
                tasks,
            });
        }
    }

    let mut sections = Vec::new();

    if let Some(groups) = by_date.remove(today) {
        let total = groups.iter().map(|g| g.tasks.len()).sum();
        let done = groups
            .iter()
            .flat_map(|g| g.tasks.iter())
            .filter(|t| t.completed)
            .count();
        if total > 0 {
            sections.push(AgendaSection {
                key: SectionKey::Today(today.to_string()),
                files: groups.into_iter().map(sort_group).collect(),
                progress: Some(Progress { done, total }),
            });
        }
    }

    let undated = by_date.remove("");

    for (date, groups) in by_date.into_iter().rev() {
        let files = incomplete_only(groups);
        if !files.is_empty() {
            sections.push(AgendaSection {
                key: SectionKey::Date(date),
                files,
                progress: None,
            });
        }
    }

    if let Some(groups) = undated {
        let files = incomplete_only(groups);
        if !files.is_empty() {
            sections.push(AgendaSection {
                key: SectionKey::Undated,
                files,
                progress: None,
            });
        }
    }

    sections
}

fn incomplete_only(groups: Vec<FileGroup>) -> Vec<FileGroup> {
    groups
        .into_iter()
        .filter_map(|mut group| {
            group.tasks.retain(|t| !t.completed);
            (!group.tasks.is_empty()).then_some(group)
        })
        .collect()
}

fn sort_group(mut group: FileGroup) -> FileGroup {
    group.tasks.sort_by_key(|t| t.completed);
    group
}

// ---------------------------------------------------------------------------
// Daily summary
// ---------------------------------------------------------------------------

/// Per-file records logged on `date`; files without any are omitted.
pub fn daily_summary<S: AsRef<str>>(
    documents: &[(PathBuf, Vec<S>)],
    date: &str,
) -> Vec<(PathBuf, Vec<DatedTaskRecord>)> {
    documents
        .iter()
        .filter_map(|(file, lines)| {
            let records = extract_for_date(lines, date);
            (!records.is_empty()).then(|| (file.clone(), records))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract_all_dates;
    use chrono::TimeZone;

    fn file(name: &str, lines: &[&str]) -> (PathBuf, Vec<ParsedTaskRecord>) {
        (PathBuf::from(name), extract_all_dates(lines.iter().copied()))
    }

    #[test]
    fn local_date_is_zero_padded() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).single().expect("valid time");
        assert_eq!(local_date_string(now), "2026-03-07");
    }

    #[test]
    fn today_section_first_with_progress() {
        let files = vec![file(
            "work.md",
            &[
                "- [x] done today",
                "    - 2026-02-01: finished",
                "- [ ] still open",
                "    - 2026-02-01: started",
            ],
        )];
        let sections = build(&files, "2026-02-01");

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].key, SectionKey::Today("2026-02-01".into()));
        assert_eq!(sections[0].progress, Some(Progress { done: 1, total: 2 }));
        let texts: Vec<_> = sections[0].files[0].tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["still open", "done today"]);
    }

    #[test]
    fn past_dates_newest_first_and_incomplete_only() {
        let files = vec![file(
            "work.md",
            &[
                "- [ ] open a",
                "    - 2026-01-10: a",
                "- [x] closed b",
                "    - 2026-01-20: b",
                "- [ ] open c",
                "    - 2026-01-30: c",
            ],
        )];
        let sections = build(&files, "2026-02-01");
        let keys: Vec<_> = sections.iter().map(|s| s.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                SectionKey::Date("2026-01-30".into()),
                SectionKey::Date("2026-01-10".into()),
            ]
        );
    }

    #[test]
    fn undated_bucket_is_last() {
        let files = vec![
            file("a.md", &["- [ ] no history"]),
            file("b.md", &["- [ ] dated", "  - 2026-01-05: x"]),
        ];
        let sections = build(&files, "2026-02-01");
        assert_eq!(sections.last().map(|s| s.key.clone()), Some(SectionKey::Undated));
        assert_eq!(sections.last().map(|s| s.files[0].file.clone()), Some(PathBuf::from("a.md")));
    }

    #[test]
    fn daily_summary_skips_files_without_matches() {
        let docs = vec![
            (PathBuf::from("a.md"), vec!["- [ ] a", "  - 2026-02-01: hit"]),
            (PathBuf::from("b.md"), vec!["- [ ] b", "  - 2026-01-01: miss"]),
        ];
        let summary = daily_summary(&docs, "2026-02-01");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].0, PathBuf::from("a.md"));
        assert_eq!(summary[0].1[0].log, "hit");
    }
}
