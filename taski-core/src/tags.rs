//! `#tag` extraction from task labels and tag-centric grouping.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::types::ParsedTaskRecord;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([^\s#]+)").expect("tag pattern"));

/// Every `#tag` in `text`, in order of appearance, without the `#`.
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A task listed under a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedTask {
    pub completed: bool,
    pub text: String,
    pub source_line: usize,
}

/// Tasks from one file carrying a given tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFileGroup {
    pub file: PathBuf,
    pub tasks: Vec<TaggedTask>,
}

impl TagFileGroup {
    /// Tasks with incomplete ones first; order is otherwise preserved.
    pub fn sorted_tasks(&self) -> Vec<&TaggedTask> {
        let mut tasks: Vec<&TaggedTask> = self.tasks.iter().collect();
        tasks.sort_by_key(|task| task.completed);
        tasks
    }
}

/// Build tag → file groups from per-file all-dates records.
///
/// A task appears once per distinct tag even though the all-dates records
/// repeat it for every log line. Tags iterate in sorted order.
pub fn group_by_tag(
    files: &[(PathBuf, Vec<ParsedTaskRecord>)],
) -> BTreeMap<String, Vec<TagFileGroup>> {
    let mut groups: BTreeMap<String, Vec<TagFileGroup>> = BTreeMap::new();

    for (file, records) in files {
        let mut seen_lines = Vec::new();
        for record in records {
            if seen_lines.contains(&record.source_line) {
                continue;
            }
            seen_lines.push(record.source_line);

            let mut tags: Vec<String> = Vec::new();
            for tag in extract_tags(&record.text) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            for tag in tags {
                let file_groups = groups.entry(tag).or_default();
                let index = match file_groups.iter().position(|g| &g.file == file) {
                    Some(index) => index,
                    None => {
                        file_groups.push(TagFileGroup {
                            file: file.clone(),
                            tasks: Vec::new(),
                        });
                        file_groups.len() - 1
                    }
                };
                file_groups[index].tasks.push(TaggedTask {
                    completed: record.completed,
                    text: record.text.clone(),
                    source_line: record.source_line,
                });
            }
        }
    }

    groups
}

/// Total task count under a tag.
pub fn tag_task_count(groups: &[TagFileGroup]) -> usize {
    groups.iter().map(|g| g.tasks.len()).sum()
}
