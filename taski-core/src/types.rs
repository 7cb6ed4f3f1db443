//! Domain types produced by the parser.
//!
//! Records are flat and serializable so presentation code (CLI tables, JSON
//! output) can consume them without knowing the ownership rules.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A dated progress note nested under a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Literal `YYYY-MM-DD`; never calendar-validated.
    pub date: String,
    pub content: String,
    /// Leading whitespace characters on the log line.
    pub indent: usize,
}

/// One checklist item and the log entries it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub completed: bool,
    pub text: String,
    /// Zero-based line index of the task marker.
    pub source_line: usize,
    /// Leading whitespace characters on the marker line.
    pub indent: usize,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

// ---------------------------------------------------------------------------
// Flattened records
// ---------------------------------------------------------------------------

/// Output unit of [`crate::parser::extract_for_date`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedTaskRecord {
    pub completed: bool,
    pub text: String,
    pub source_line: usize,
    pub log: String,
}

/// Output unit of [`crate::parser::extract_all_dates`].
///
/// A task without any owned log is represented once with empty `date` and
/// `log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTaskRecord {
    pub completed: bool,
    pub text: String,
    pub source_line: usize,
    pub log: String,
    pub date: String,
}

impl ParsedTaskRecord {
    /// `true` for the placeholder record of a task with no log history.
    pub fn is_undated(&self) -> bool {
        self.date.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undated_record_detection() {
        let record = ParsedTaskRecord {
            completed: false,
            text: "write report".to_string(),
            source_line: 3,
            log: String::new(),
            date: String::new(),
        };
        assert!(record.is_undated());
    }

    #[test]
    fn task_yaml_roundtrip_defaults_logs() {
        let yaml = "completed: true\ntext: ship it\nsource_line: 0\nindent: 2\n";
        let task: Task = serde_yaml::from_str(yaml).expect("deserialize");
        assert!(task.completed);
        assert!(task.logs.is_empty());
    }
}
