//! Line-oriented task/log parser.
//!
//! # Grammar
//!
//! ```text
//! task marker  ^(\s*)-\s*\[([ x])\]\s*(.*)           indent, flag, label
//! log line     ^(\s*)-\s*(\d{4}-\d{2}-\d{2}):\s*(.*)  indent, date, note
//! ```
//!
//! Every other line is inert. A line is tested as a task marker first, so
//! `- [ ] 2026-01-01: x` is a task.
//!
//! # Ownership
//!
//! The scanner keeps a single "open task" pointer. A log line belongs to the
//! open task only when it is indented strictly deeper than that task's marker;
//! otherwise it is dropped. Ancestors are never consulted, so a nested marker
//! shadows its parent for every log line that follows it.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{DatedTaskRecord, LogEntry, ParsedTaskRecord, Task};

static TASK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)-\s*\[([ x])\]\s*(.*)").expect("task marker pattern"));

// `[0-9]` rather than `\d`: the regex crate's `\d` also matches non-ASCII digits.
static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)-\s*([0-9]{4}-[0-9]{2}-[0-9]{2}):\s*(.*)").expect("log line pattern")
});

// ---------------------------------------------------------------------------
// 1. Line matchers
// ---------------------------------------------------------------------------

/// Captures of a task-marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMarker<'a> {
    pub indent: usize,
    pub completed: bool,
    pub text: &'a str,
}

/// Captures of a dated log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub indent: usize,
    pub date: &'a str,
    pub content: &'a str,
}

/// Match `line` against the task-marker shape.
pub fn match_task_marker(line: &str) -> Option<TaskMarker<'_>> {
    let caps = TASK_MARKER.captures(line)?;
    Some(TaskMarker {
        indent: caps.get(1).map_or(0, |m| m.as_str().chars().count()),
        completed: caps.get(2).is_some_and(|m| m.as_str() == "x"),
        text: caps.get(3).map_or("", |m| m.as_str()),
    })
}

/// Match `line` against the dated log-line shape.
pub fn match_log_line(line: &str) -> Option<LogLine<'_>> {
    let caps = LOG_LINE.captures(line)?;
    Some(LogLine {
        indent: caps.get(1).map_or(0, |m| m.as_str().chars().count()),
        date: caps.get(2).map_or("", |m| m.as_str()),
        content: caps.get(3).map_or("", |m| m.as_str()),
    })
}

// ---------------------------------------------------------------------------
// 2. Document scan
// ---------------------------------------------------------------------------

/// Scan `lines` once and return every task with the log entries it owns, in
/// marker order.
pub fn parse_document<I, S>(lines: I) -> Vec<Task>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tasks: Vec<Task> = Vec::new();

    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();

        if let Some(marker) = match_task_marker(line) {
            tasks.push(Task {
                completed: marker.completed,
                text: marker.text.to_string(),
                source_line: index,
                indent: marker.indent,
                logs: Vec::new(),
            });
            continue;
        }

        let Some(log) = match_log_line(line) else {
            continue;
        };
        let Some(open) = tasks.last_mut() else {
            continue;
        };
        if log.indent > open.indent {
            open.logs.push(LogEntry {
                date: log.date.to_string(),
                content: log.content.to_string(),
                indent: log.indent,
            });
        }
    }

    tasks
}

/// Convenience wrapper over [`parse_document`] for a whole text buffer.
pub fn parse_text(text: &str) -> Vec<Task> {
    parse_document(text.lines())
}

// ---------------------------------------------------------------------------
// 3. Extraction
// ---------------------------------------------------------------------------

/// One record per owned log line dated exactly `target_date`.
pub fn extract_for_date<I, S>(lines: I, target_date: &str) -> Vec<DatedTaskRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_document(lines)
        .into_iter()
        .flat_map(|task| {
            task.logs
                .into_iter()
                .filter(|log| log.date == target_date)
                .map(|log| DatedTaskRecord {
                    completed: task.completed,
                    text: task.text.clone(),
                    source_line: task.source_line,
                    log: log.content,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// One record per owned log line of any date, plus one undated record for
/// each task that owns none.
pub fn extract_all_dates<I, S>(lines: I) -> Vec<ParsedTaskRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut records = Vec::new();
    for task in parse_document(lines) {
        records.extend(flatten_task(task));
    }
    records
}

fn flatten_task(task: Task) -> Vec<ParsedTaskRecord> {
    if task.logs.is_empty() {
        return vec![ParsedTaskRecord {
            completed: task.completed,
            text: task.text,
            source_line: task.source_line,
            log: String::new(),
            date: String::new(),
        }];
    }

    task.logs
        .into_iter()
        .map(|log| ParsedTaskRecord {
            completed: task.completed,
            text: task.text.clone(),
            source_line: task.source_line,
            log: log.content,
            date: log.date,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
