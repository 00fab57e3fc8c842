//! Langfuse command - list and inspect Langfuse traces and sessions.
//!
//! Always talks to Langfuse, whatever `default_provider` says. Paging and
//! filters are applied server-side.

use anyhow::Result;
use clap::Subcommand;

use crate::app::App;
use crate::cli::format::OutputFormat;
use crate::cli::render::{self, langfuse as view};
use crate::provider::langfuse::{PageQuery, TraceQuery, DEFAULT_LIMIT};
use crate::query::filter::{parse_timestamp, FilterError};

/// Arguments for the langfuse command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    shepherd langfuse traces list                    First page of traces\n    \
    shepherd langfuse traces list -t prod -u alice   Filter by tag and user\n    \
    shepherd langfuse traces get <id>                Observation tree of a trace\n    \
    shepherd langfuse sessions list --from 2025-12-01\n    \
    shepherd langfuse sessions get <id>              Session with its traces")]
pub struct Args {
    #[command(subcommand)]
    pub command: LangfuseCommand,
}

#[derive(Subcommand)]
pub enum LangfuseCommand {
    /// List and inspect Langfuse traces
    Traces {
        #[command(subcommand)]
        command: TraceCommand,
    },
    /// List and inspect Langfuse sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

/// Trace subcommands, shared with the routed `traces` command.
#[derive(Subcommand)]
pub enum TraceCommand {
    /// List traces, one page at a time
    List(TraceListArgs),
    /// Show one trace with its observation tree
    Get(GetArgs),
}

/// Langfuse session subcommands.
#[derive(Subcommand)]
pub enum SessionCommand {
    /// List sessions, one page at a time
    List(PageArgs),
    /// Show one session with its traces
    Get(GetArgs),
}

/// Paging, time window and output options shared by the list commands.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct PageArgs {
    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Page size [default: 50]
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<u32>,

    /// Page number [default: 1]
    #[arg(short, long, value_name = "N")]
    pub page: Option<u32>,

    /// Only items at or after this time (ISO 8601 or YYYY-MM-DD)
    #[arg(long, value_name = "TIMESTAMP")]
    pub from: Option<String>,

    /// Only items at or before this time (ISO 8601 or YYYY-MM-DD)
    #[arg(long, value_name = "TIMESTAMP")]
    pub to: Option<String>,

    /// Print ids only, one per line
    #[arg(long)]
    pub ids: bool,
}

impl PageArgs {
    /// Validates paging and parses the time window.
    pub fn page_query(&self) -> Result<PageQuery, FilterError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 {
            return Err(FilterError::InvalidLimit(0));
        }
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(FilterError::InvalidPage(0));
        }
        Ok(PageQuery {
            page,
            limit,
            from: self
                .from
                .as_deref()
                .map(|raw| parse_timestamp("from", raw))
                .transpose()?,
            to: self
                .to
                .as_deref()
                .map(|raw| parse_timestamp("to", raw))
                .transpose()?,
        })
    }
}

/// Arguments for `traces list`.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct TraceListArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Only traces with this name
    #[arg(long)]
    pub name: Option<String>,

    /// Only traces of this user
    #[arg(short, long, value_name = "ID")]
    pub user_id: Option<String>,

    /// Only traces in this session
    #[arg(short, long, value_name = "ID")]
    pub session_id: Option<String>,

    /// Only traces carrying this tag (repeatable, all must match)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

impl TraceListArgs {
    pub fn trace_query(&self) -> Result<TraceQuery, FilterError> {
        let given = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(TraceQuery {
            page: self.page.page_query()?,
            name: given(&self.name),
            user_id: given(&self.user_id),
            session_id: given(&self.session_id),
            tags: self.tags.clone(),
        })
    }
}

/// Arguments for the `get` commands.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct GetArgs {
    /// Trace or session id
    pub id: String,

    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Executes the langfuse command.
pub fn run(app: &mut App, args: Args) -> Result<()> {
    match args.command {
        LangfuseCommand::Traces { command } => run_traces(app, command),
        LangfuseCommand::Sessions { command } => match command {
            SessionCommand::List(args) => list_sessions(app, &args),
            SessionCommand::Get(args) => get_session(app, &args),
        },
    }
}

/// Executes a trace subcommand against Langfuse.
pub fn run_traces(app: &mut App, command: TraceCommand) -> Result<()> {
    match command {
        TraceCommand::List(args) => list_traces(app, &args),
        TraceCommand::Get(args) => get_trace(app, &args),
    }
}

/// Lists one page of traces.
pub fn list_traces(app: &mut App, args: &TraceListArgs) -> Result<()> {
    let query = args.trace_query()?;
    let format = resolve_format(app, args.page.output)?;
    tracing::debug!(?query, "Listing Langfuse traces");

    let page = app.trace_provider()?.list_traces(&query)?;
    if args.page.ids {
        let ids: Vec<String> = page.data.into_iter().map(|t| t.id).collect();
        return render::write_ids(app.out(), &ids);
    }
    match format {
        OutputFormat::Json => view::traces_json(app.out(), &page),
        OutputFormat::Table => view::traces_table(app.out(), &page),
    }
}

/// Shows one trace.
pub fn get_trace(app: &mut App, args: &GetArgs) -> Result<()> {
    let format = resolve_format(app, args.output)?;
    let trace = app.trace_provider()?.get_trace(args.id.trim())?;
    match format {
        OutputFormat::Json => view::pretty_json(app.out(), &trace),
        OutputFormat::Table => view::trace_detail(app.out(), &trace),
    }
}

/// Lists one page of sessions.
pub fn list_sessions(app: &mut App, args: &PageArgs) -> Result<()> {
    let query = args.page_query()?;
    let format = resolve_format(app, args.output)?;
    tracing::debug!(?query, "Listing Langfuse sessions");

    let page = app.trace_provider()?.list_sessions(&query)?;
    if args.ids {
        let ids: Vec<String> = page.data.into_iter().map(|s| s.id).collect();
        return render::write_ids(app.out(), &ids);
    }
    match format {
        OutputFormat::Json => view::sessions_json(app.out(), &page),
        OutputFormat::Table => view::sessions_table(app.out(), &page),
    }
}

/// Shows one session.
pub fn get_session(app: &mut App, args: &GetArgs) -> Result<()> {
    let format = resolve_format(app, args.output)?;
    let session = app.trace_provider()?.get_session(args.id.trim())?;
    match format {
        OutputFormat::Json => view::pretty_json(app.out(), &session),
        OutputFormat::Table => view::session_detail(app.out(), &session),
    }
}

fn resolve_format(app: &App, requested: Option<OutputFormat>) -> Result<OutputFormat> {
    match requested {
        Some(format) => Ok(format),
        None => Ok(app.config()?.cli.output_format),
    }
}
