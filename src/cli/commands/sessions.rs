//! Sessions command - list, fetch, search and diff sessions.
//!
//! The top-level command routes by `default_provider`: `list` and `get`
//! work against either provider, `search` and `diff` only against AIOBS.
//! AIOBS sessions are fetched fresh on every call and run through the
//! query engine. Filters are validated before any request is made.

use anyhow::Result;
use clap::Subcommand;

use super::langfuse;
use crate::app::App;
use crate::cli::format::OutputFormat;
use crate::cli::render;
use crate::config::ConfigError;
use crate::provider::{Provider, ProviderError, SessionsResponse};
use crate::query::{self, FilterOptions, FilterSpec, SessionDiff};
use crate::session::Session;

/// Arguments for the sessions command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    shepherd sessions list                       List all sessions\n    \
    shepherd sessions list -n 5 --ids            Ids of the five most recent\n    \
    shepherd sessions get 550e8400               Show one session\n    \
    shepherd sessions search \"checkout\"          Text search\n    \
    shepherd sessions search -l env=prod --has-errors\n    \
    shepherd sessions diff <id1> <id2>           Compare two sessions\n\n\
    search and diff need the aiobs provider. Under langfuse, use\n\
    'shepherd aiobs sessions ...' to reach AIOBS explicitly.")]
pub struct Args {
    #[command(subcommand)]
    pub command: SessionsCommand,
}

/// Sessions subcommands, routed by the default provider.
#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List sessions, most recent first
    List(RoutedListArgs),
    /// Show one session with its trace tree
    Get(GetArgs),
    /// Search sessions by text, labels, provider, dates and outcome
    Search(SearchArgs),
    /// Compare two sessions
    Diff(DiffArgs),
}

/// Arguments for `sessions list`.
#[derive(clap::Args, Debug, Default)]
pub struct ListArgs {
    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Maximum number of sessions to show
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Print session ids only, one per line
    #[arg(long)]
    pub ids: bool,
}

/// Arguments for the routed `sessions list`.
#[derive(clap::Args, Debug, Default)]
pub struct RoutedListArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Page number (langfuse only)
    #[arg(short, long, value_name = "N")]
    pub page: Option<u32>,

    /// Only sessions at or after this time (langfuse only)
    #[arg(long, value_name = "TIMESTAMP")]
    pub from: Option<String>,

    /// Only sessions at or before this time (langfuse only)
    #[arg(long, value_name = "TIMESTAMP")]
    pub to: Option<String>,
}

impl RoutedListArgs {
    /// The same request as a Langfuse page request.
    fn langfuse_args(&self) -> langfuse::PageArgs {
        langfuse::PageArgs {
            output: self.list.output,
            limit: self
                .list
                .limit
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            page: self.page,
            from: self.from.clone(),
            to: self.to.clone(),
            ids: self.list.ids,
        }
    }

    fn langfuse_only_options(&self) -> Vec<&'static str> {
        let given = [
            ("--page", self.page.is_some()),
            ("--from", self.from.is_some()),
            ("--to", self.to.is_some()),
        ];
        given
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Arguments for `sessions get`.
#[derive(clap::Args, Debug, Default)]
pub struct GetArgs {
    /// Session id
    pub id: String,

    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Arguments for `sessions search`.
#[derive(clap::Args, Debug, Default)]
pub struct SearchArgs {
    /// Text matched against id, name and label values (case-insensitive)
    pub query: Option<String>,

    /// Required label, KEY=VALUE (repeatable, all must match)
    #[arg(short, long = "label", value_name = "KEY=VALUE")]
    pub labels: Vec<String>,

    /// Provider of the session's LLM calls
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model of the session's LLM calls
    #[arg(short, long)]
    pub model: Option<String>,

    /// Function invoked during the session
    #[arg(short, long)]
    pub function: Option<String>,

    /// Sessions started on or after this day (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    pub after: Option<String>,

    /// Sessions started on or before this day (YYYY-MM-DD, UTC)
    #[arg(long, value_name = "DATE")]
    pub before: Option<String>,

    /// Only sessions with errors
    #[arg(long)]
    pub has_errors: bool,

    /// Only sessions with failed evaluations
    #[arg(long)]
    pub evals_failed: bool,

    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Maximum number of sessions to show
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Print session ids only, one per line
    #[arg(long)]
    pub ids: bool,
}

impl SearchArgs {
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            query: self.query.clone(),
            labels: self.labels.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            function: self.function.clone(),
            after: self.after.clone(),
            before: self.before.clone(),
            has_errors: self.has_errors,
            evals_failed: self.evals_failed,
            limit: self.limit,
            ids_only: self.ids,
        }
    }
}

/// Arguments for `sessions diff`.
#[derive(clap::Args, Debug, Default)]
pub struct DiffArgs {
    /// First session id
    pub left: String,

    /// Second session id
    pub right: String,

    /// Output format (defaults to cli.output_format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Executes the sessions command.
pub fn run(app: &mut App, args: Args) -> Result<()> {
    match args.command {
        SessionsCommand::List(args) => route_list(app, &args),
        SessionsCommand::Get(args) => route_get(app, &args),
        SessionsCommand::Search(args) => route_search(app, &args),
        SessionsCommand::Diff(args) => route_diff(app, &args),
    }
}

/// Lists sessions from the default provider.
pub fn route_list(app: &mut App, args: &RoutedListArgs) -> Result<()> {
    match app.default_provider()? {
        Provider::Langfuse => langfuse::list_sessions(app, &args.langfuse_args()),
        Provider::Aiobs => {
            let ignored = args.langfuse_only_options();
            if !ignored.is_empty() {
                tracing::warn!("Ignoring {} (langfuse only)", ignored.join(", "));
            }
            list(app, &args.list)
        }
    }
}

/// Shows one session from the default provider.
pub fn route_get(app: &mut App, args: &GetArgs) -> Result<()> {
    match app.default_provider()? {
        Provider::Langfuse => langfuse::get_session(
            app,
            &langfuse::GetArgs {
                id: args.id.clone(),
                output: args.output,
            },
        ),
        Provider::Aiobs => get(app, args),
    }
}

/// Searches sessions; AIOBS only.
pub fn route_search(app: &mut App, args: &SearchArgs) -> Result<()> {
    require_aiobs(app, "session search", SEARCH_HINT)?;
    search(app, args)
}

/// Compares two sessions; AIOBS only.
pub fn route_diff(app: &mut App, args: &DiffArgs) -> Result<()> {
    require_aiobs(app, "session diff", DIFF_HINT)?;
    diff(app, args)
}

const SEARCH_HINT: &str = "Switch to aiobs: shepherd config set provider aiobs\n\
    Or use explicit: shepherd aiobs sessions search";
const DIFF_HINT: &str = "Switch to aiobs: shepherd config set provider aiobs\n\
    Or use explicit: shepherd aiobs sessions diff";

fn require_aiobs(app: &App, operation: &'static str, hint: &'static str) -> Result<()> {
    match app.default_provider()? {
        Provider::Aiobs => Ok(()),
        provider => Err(ConfigError::Unsupported {
            provider,
            operation,
            hint,
        }
        .into()),
    }
}

/// Lists every session, most recent first.
pub fn list(app: &mut App, args: &ListArgs) -> Result<()> {
    let spec = FilterSpec::parse(&FilterOptions {
        limit: args.limit,
        ids_only: args.ids,
        ..Default::default()
    })?;
    run_query(app, &spec, args.output)
}

/// Searches sessions with the given filters.
pub fn search(app: &mut App, args: &SearchArgs) -> Result<()> {
    let spec = FilterSpec::parse(&args.filter_options())?;
    tracing::debug!(?spec, "Searching sessions");
    run_query(app, &spec, args.output)
}

fn run_query(app: &mut App, spec: &FilterSpec, output: Option<OutputFormat>) -> Result<()> {
    let format = resolve_format(app, output)?;
    let provider = app.session_provider()?;
    let sessions = provider.list_sessions()?.summarize();
    tracing::debug!(fetched = sessions.len(), "Fetched sessions");

    let result = query::execute(spec, sessions);
    render::query_output(app.out(), &result, format)
}

/// Shows one session.
pub fn get(app: &mut App, args: &GetArgs) -> Result<()> {
    let format = resolve_format(app, args.output)?;
    let (session, response) = fetch_one(app, &args.id)?;

    match format {
        OutputFormat::Json => render::response_json(app.out(), &response),
        OutputFormat::Table => render::session_detail(app.out(), &session, &response),
    }
}

/// Compares two sessions.
pub fn diff(app: &mut App, args: &DiffArgs) -> Result<()> {
    let format = resolve_format(app, args.output)?;
    let (left, _) = fetch_one(app, &args.left)?;
    let (right, _) = fetch_one(app, &args.right)?;

    render::session_diff(app.out(), &SessionDiff::new(left, right), format)
}

fn fetch_one(app: &App, id: &str) -> Result<(Session, SessionsResponse)> {
    let id = id.trim();
    let response = app.session_provider()?.get_session(id)?;
    let session = pick_session(response.summarize(), id)
        .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
    Ok((session, response))
}

/// Picks the requested session from a detail response. A response holding
/// a single session is taken as the answer.
fn pick_session(mut sessions: Vec<Session>, id: &str) -> Option<Session> {
    if let Some(pos) = sessions.iter().position(|s| s.id == id) {
        return Some(sessions.swap_remove(pos));
    }
    match sessions.len() {
        1 => sessions.pop(),
        _ => None,
    }
}

fn resolve_format(app: &App, requested: Option<OutputFormat>) -> Result<OutputFormat> {
    match requested {
        Some(format) => Ok(format),
        None => Ok(app.config()?.cli.output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            name: id.to_string(),
            started_at: Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap(),
            ended_at: None,
            provider: None,
            model: None,
            providers: BTreeSet::new(),
            models: BTreeSet::new(),
            functions: BTreeSet::new(),
            labels: BTreeMap::new(),
            has_errors: false,
            evals_failed: false,
            llm_calls: 0,
            function_calls: 0,
        }
    }

    #[test]
    fn test_pick_session_by_id() {
        let picked = pick_session(vec![session("a"), session("b")], "b").unwrap();
        assert_eq!(picked.id, "b");
    }

    #[test]
    fn test_pick_session_single_response() {
        let picked = pick_session(vec![session("full-id")], "full").unwrap();
        assert_eq!(picked.id, "full-id");
    }

    #[test]
    fn test_pick_session_missing() {
        assert!(pick_session(vec![], "a").is_none());
        assert!(pick_session(vec![session("a"), session("b")], "c").is_none());
    }

    #[test]
    fn test_routed_list_to_langfuse_args() {
        let args = RoutedListArgs {
            list: ListArgs {
                limit: Some(5),
                ids: true,
                ..Default::default()
            },
            page: Some(2),
            from: Some("2025-12-01".to_string()),
            to: None,
        };
        let page = args.langfuse_args();
        assert_eq!(page.limit, Some(5));
        assert_eq!(page.page, Some(2));
        assert!(page.ids);
        assert_eq!(args.langfuse_only_options(), ["--page", "--from"]);
        assert!(RoutedListArgs::default().langfuse_only_options().is_empty());
    }

    #[test]
    fn test_search_args_to_filter_options() {
        let args = SearchArgs {
            query: Some("checkout".to_string()),
            labels: vec!["env=prod".to_string()],
            has_errors: true,
            limit: Some(3),
            ids: true,
            ..Default::default()
        };
        let options = args.filter_options();
        assert_eq!(options.query.as_deref(), Some("checkout"));
        assert_eq!(options.labels, vec!["env=prod"]);
        assert!(options.has_errors);
        assert_eq!(options.limit, Some(3));
        assert!(options.ids_only);
    }
}
