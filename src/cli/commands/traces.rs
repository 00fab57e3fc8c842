//! Traces command - traces from the default provider.
//!
//! Only Langfuse records traces; under AIOBS the command explains how to
//! switch.

use anyhow::Result;

use super::langfuse::{self, TraceCommand, TraceListArgs};
use crate::app::App;
use crate::config::ConfigError;
use crate::provider::Provider;

/// Arguments for the traces command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    shepherd traces list                     First page of traces\n    \
    shepherd traces list --from 2025-12-01   Traces since a day\n    \
    shepherd traces get <id>                 Observation tree of a trace")]
pub struct Args {
    #[command(subcommand)]
    pub command: TraceCommand,
}

const HINT: &str = "Switch to langfuse: shepherd config set provider langfuse";

/// Executes the traces command.
pub fn run(app: &mut App, args: Args) -> Result<()> {
    require_traces(app)?;
    langfuse::run_traces(app, args.command)
}

/// Lists traces from the default provider.
pub fn list(app: &mut App, args: &TraceListArgs) -> Result<()> {
    require_traces(app)?;
    langfuse::list_traces(app, args)
}

/// Shows one trace from the default provider.
pub fn get(app: &mut App, args: &langfuse::GetArgs) -> Result<()> {
    require_traces(app)?;
    langfuse::get_trace(app, args)
}

fn require_traces(app: &App) -> Result<()> {
    match app.default_provider()? {
        Provider::Langfuse => Ok(()),
        provider => Err(ConfigError::Unsupported {
            provider,
            operation: "traces",
            hint: HINT,
        }
        .into()),
    }
}
