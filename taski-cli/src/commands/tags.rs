//! `taski tags`: tasks grouped by `#tag`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use taski_core::extract_all_dates;
use taski_core::tags::{group_by_tag, tag_task_count};

use super::{checkbox, display_path, home_dir, load_notes};

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "tag")]
    tag: String,
    #[tabled(rename = "tasks")]
    tasks: usize,
    #[tabled(rename = "open")]
    open: usize,
    #[tabled(rename = "files")]
    files: usize,
}

impl TagsArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let records: Vec<(PathBuf, _)> = load_notes(&home)?
            .into_iter()
            .map(|(file, lines)| (file, extract_all_dates(&lines)))
            .collect();
        let groups = group_by_tag(&records);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&groups).context("failed to serialize tags JSON")?
            );
            return Ok(());
        }

        if groups.is_empty() {
            println!("No tagged tasks.");
            return Ok(());
        }

        let rows: Vec<TagRow> = groups
            .iter()
            .map(|(tag, files)| TagRow {
                tag: format!("#{tag}"),
                tasks: tag_task_count(files),
                open: files
                    .iter()
                    .flat_map(|g| g.tasks.iter())
                    .filter(|t| !t.completed)
                    .count(),
                files: files.len(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for (tag, files) in &groups {
            println!("{}", format!("#{tag}").bold());
            for group in files {
                println!("  {}", display_path(&home, &group.file).cyan());
                for task in group.sorted_tasks() {
                    println!("    {} {}", checkbox(task.completed), task.text);
                }
            }
        }
        Ok(())
    }
}
