//! taski: Markdown task log CLI.
//!
//! # Usage
//!
//! ```text
//! taski today [--date YYYY-MM-DD] [--json]
//! taski agenda [--json]
//! taski tags [--json]
//! taski sync [--once]
//! taski shell
//! taski daemon start|stop|status|logs|retry|pause
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    agenda::AgendaArgs, daemon::DaemonCommand, sync::SyncArgs, tags::TagsArgs, today::TodayArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "taski",
    version,
    about = "Task logs in Markdown notes, kept in sync with git",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tasks logged on one day (today by default).
    Today(TodayArgs),

    /// Open tasks grouped by log date.
    Agenda(AgendaArgs),

    /// Tasks grouped by `#tag`.
    Tags(TagsArgs),

    /// Commit, rebase and push the notes repository.
    Sync(SyncArgs),

    /// Open a shell in the notes repository.
    Shell,

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Today(args) => args.run(),
        Commands::Agenda(args) => args.run(),
        Commands::Tags(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Shell => commands::shell::run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
