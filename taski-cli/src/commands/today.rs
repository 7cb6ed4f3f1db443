//! `taski today`: what was logged on one day.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use taski_core::agenda;
use taski_core::types::DatedTaskRecord;

use super::{checkbox, display_path, home_dir, load_notes};

#[derive(Args, Debug)]
pub struct TodayArgs {
    /// Day to show instead of today (YYYY-MM-DD).
    #[arg(long)]
    pub date: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DailyJson {
    date: String,
    files: Vec<DailyFileJson>,
}

#[derive(Serialize)]
struct DailyFileJson {
    file: PathBuf,
    tasks: Vec<DatedTaskRecord>,
}

impl TodayArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let date = match self.date {
            Some(date) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("invalid --date '{date}'; expected YYYY-MM-DD"))?
                .format("%Y-%m-%d")
                .to_string(),
            None => agenda::today(),
        };

        let documents = load_notes(&home)?;
        let summary = agenda::daily_summary(&documents, &date);

        if self.json {
            let payload = DailyJson {
                date,
                files: summary
                    .into_iter()
                    .map(|(file, tasks)| DailyFileJson { file, tasks })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize daily JSON")?
            );
            return Ok(());
        }

        let total: usize = summary.iter().map(|(_, records)| records.len()).sum();
        if total == 0 {
            println!("No entries for {date}.");
            return Ok(());
        }
        let done = summary
            .iter()
            .flat_map(|(_, records)| records.iter())
            .filter(|r| r.completed)
            .count();

        println!("{} {}", date.bold(), format!("{done}/{total}").bright_black());
        for (file, records) in summary {
            println!("{}", display_path(&home, &file).cyan());
            for record in records {
                let line = format!("  {} {}", checkbox(record.completed), record.text);
                if record.completed {
                    println!("{}", line.green());
                } else {
                    println!("{line}");
                }
                if !record.log.is_empty() {
                    println!("      {}", record.log.bright_black());
                }
            }
        }
        Ok(())
    }
}
