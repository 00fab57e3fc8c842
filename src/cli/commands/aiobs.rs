//! Aiobs command - AIOBS sessions regardless of the default provider.

use anyhow::Result;
use clap::Subcommand;

use super::sessions::{self, DiffArgs, GetArgs, ListArgs, SearchArgs};
use crate::app::App;

/// Arguments for the aiobs command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    shepherd aiobs sessions list                 AIOBS sessions, most recent first\n    \
    shepherd aiobs sessions search -p openai     Search even when langfuse is the default\n    \
    shepherd aiobs sessions diff <id1> <id2>     Compare two sessions")]
pub struct Args {
    #[command(subcommand)]
    pub command: AiobsCommand,
}

#[derive(Subcommand)]
pub enum AiobsCommand {
    /// List, fetch, search and compare AIOBS sessions
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List sessions, most recent first
    List(ListArgs),
    /// Show one session with its trace tree
    Get(GetArgs),
    /// Search sessions by text, labels, provider, dates and outcome
    Search(SearchArgs),
    /// Compare two sessions
    Diff(DiffArgs),
}

/// Executes the aiobs command.
pub fn run(app: &mut App, args: Args) -> Result<()> {
    let AiobsCommand::Sessions { command } = args.command;
    match command {
        SessionsCommand::List(args) => sessions::list(app, &args),
        SessionsCommand::Get(args) => sessions::get(app, &args),
        SessionsCommand::Search(args) => sessions::search(app, &args),
        SessionsCommand::Diff(args) => sessions::diff(app, &args),
    }
}
