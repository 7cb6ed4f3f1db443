//! `taski agenda`: open tasks grouped by log date.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use taski_core::agenda::{self, AgendaSection, SectionKey};
use taski_core::extract_all_dates;

use super::{checkbox, display_path, home_dir, load_notes};

#[derive(Args, Debug)]
pub struct AgendaArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl AgendaArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let records: Vec<(PathBuf, _)> = load_notes(&home)?
            .into_iter()
            .map(|(file, lines)| (file, extract_all_dates(&lines)))
            .collect();
        let sections = agenda::build(&records, &agenda::today());

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&sections)
                    .context("failed to serialize agenda JSON")?
            );
            return Ok(());
        }

        if sections.is_empty() {
            println!("Nothing on the agenda.");
            return Ok(());
        }
        for section in &sections {
            print_section(&home, section);
        }
        Ok(())
    }
}

fn print_section(home: &std::path::Path, section: &AgendaSection) {
    let heading = match &section.key {
        SectionKey::Today(date) => format!("Today {date}").bold().green(),
        SectionKey::Date(date) => date.bold(),
        SectionKey::Undated => "Undated".bold().bright_black(),
    };
    match &section.progress {
        Some(progress) => println!(
            "{heading} {}",
            format!("{}/{}", progress.done, progress.total).bright_black()
        ),
        None => println!("{heading}"),
    }

    for group in &section.files {
        println!("  {}", display_path(home, &group.file).cyan());
        for task in &group.tasks {
            let line = format!("    {} {}", checkbox(task.completed), task.text);
            if task.completed {
                println!("{}", line.green());
            } else {
                println!("{line}");
            }
            if !task.log.is_empty() {
                println!("        {}", task.log.bright_black());
            }
        }
    }
}
