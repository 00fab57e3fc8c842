//! Shell command table.
//!
//! Builds the registry and adapts each bound `CommandContext` into the
//! argument structs the one-shot commands use, so both paths share the
//! same handlers.

use anyhow::Result;
use colored::Colorize;
use crossterm::{
    cursor::MoveTo,
    terminal::{Clear, ClearType},
    Command,
};
use std::io::Write;

use crate::app::App;
use crate::cli::commands::{config, langfuse, sessions, traces, version};

use super::dispatch::{CommandContext, DispatchError};
use super::registry::{CommandNode, Handler, Registry};
use super::Flow;

const OUTPUT_HELP: &str = "Output format: table or json";

/// Builds the shell's command tree.
///
/// `sessions` and `traces` route by the default provider; `aiobs` and
/// `langfuse` reach one provider explicitly.
pub fn build_registry() -> Registry {
    Registry::new(vec![
        CommandNode::group("sessions", "Browse sessions of the default provider")
            .child(
                list_node(routed_sessions_list)
                    .single("page", Some('p'), "N", "Page number (langfuse only)")
                    .single("from", None, "TIMESTAMP", "At or after (langfuse only)")
                    .single("to", None, "TIMESTAMP", "At or before (langfuse only)"),
            )
            .child(get_node("Show one session", routed_sessions_get))
            .child(search_node(routed_sessions_search))
            .child(diff_node(routed_sessions_diff)),
        CommandNode::group("traces", "Browse traces (langfuse)")
            .child(trace_list_node(routed_traces_list))
            .child(get_node("Show one trace with its observations", routed_traces_get)),
        CommandNode::group("aiobs", "AIOBS sessions, whatever the default provider").child(
            CommandNode::group("sessions", "Browse AIOBS sessions")
                .child(list_node(aiobs_sessions_list))
                .child(get_node("Show one session with its trace tree", aiobs_sessions_get))
                .child(search_node(aiobs_sessions_search))
                .child(diff_node(aiobs_sessions_diff)),
        ),
        CommandNode::group("langfuse", "Langfuse, whatever the default provider")
            .child(
                CommandNode::group("traces", "Browse Langfuse traces")
                    .child(trace_list_node(langfuse_traces_list))
                    .child(get_node("Show one trace with its observations", langfuse_traces_get)),
            )
            .child(
                CommandNode::group("sessions", "Browse Langfuse sessions")
                    .child(page_options(CommandNode::leaf(
                        "list",
                        "List sessions, one page at a time",
                        langfuse_sessions_list,
                    )))
                    .child(get_node("Show one session with its traces", langfuse_sessions_get)),
            ),
        CommandNode::group("config", "View and change configuration")
            .child(
                CommandNode::leaf("init", "Create or update the config file", config_init)
                    .single("provider", None, "NAME", "Default provider: aiobs or langfuse")
                    .single("api-key", None, "KEY", "AIOBS API key")
                    .single("endpoint", None, "URL", "AIOBS API endpoint")
                    .single("public-key", None, "KEY", "Langfuse public key")
                    .single("secret-key", None, "KEY", "Langfuse secret key")
                    .single("host", None, "URL", "Langfuse host"),
            )
            .child(CommandNode::leaf("show", "Show current configuration", config_show))
            .child(
                CommandNode::leaf("get", "Get a configuration value", config_get)
                    .arg("key", true),
            )
            .child(
                CommandNode::leaf("set", "Set a configuration value", config_set)
                    .arg("key", true)
                    .arg("value", true),
            ),
        CommandNode::leaf("help", "Show commands, or help for one command", help)
            .text_arg("command"),
        CommandNode::leaf("clear", "Clear the screen", clear),
        CommandNode::leaf("version", "Show version information", show_version),
        CommandNode::leaf("exit", "Leave the shell", exit),
        CommandNode::leaf("quit", "Leave the shell", exit),
    ])
}

fn list_node(handler: Handler) -> CommandNode {
    CommandNode::leaf("list", "List sessions, most recent first", handler)
        .single("output", Some('o'), "FORMAT", OUTPUT_HELP)
        .single("limit", Some('n'), "N", "Maximum number of sessions")
        .flag("ids", None, "Print ids only")
}

fn get_node(about: &'static str, handler: Handler) -> CommandNode {
    CommandNode::leaf("get", about, handler)
        .arg("id", true)
        .single("output", Some('o'), "FORMAT", OUTPUT_HELP)
}

fn search_node(handler: Handler) -> CommandNode {
    CommandNode::leaf("search", "Search sessions (aiobs)", handler)
        .text_arg("query")
        .repeatable("label", Some('l'), "KEY=VALUE", "Required label (repeatable)")
        .single("provider", Some('p'), "PROVIDER", "Provider of the LLM calls")
        .single("model", Some('m'), "MODEL", "Model of the LLM calls")
        .single("function", Some('f'), "NAME", "Function invoked")
        .single("after", None, "DATE", "Started on or after (YYYY-MM-DD)")
        .single("before", None, "DATE", "Started on or before (YYYY-MM-DD)")
        .flag("has-errors", None, "Only sessions with errors")
        .flag("evals-failed", None, "Only sessions with failed evaluations")
        .single("output", Some('o'), "FORMAT", OUTPUT_HELP)
        .single("limit", Some('n'), "N", "Maximum number of sessions")
        .flag("ids", None, "Print session ids only")
}

fn diff_node(handler: Handler) -> CommandNode {
    CommandNode::leaf("diff", "Compare two sessions (aiobs)", handler)
        .arg("left", true)
        .arg("right", true)
        .single("output", Some('o'), "FORMAT", OUTPUT_HELP)
}

/// Options shared by the Langfuse list commands.
fn page_options(node: CommandNode) -> CommandNode {
    node.single("output", Some('o'), "FORMAT", OUTPUT_HELP)
        .single("limit", Some('n'), "N", "Page size (default 50)")
        .single("page", Some('p'), "N", "Page number (default 1)")
        .single("from", None, "TIMESTAMP", "At or after (ISO 8601 or YYYY-MM-DD)")
        .single("to", None, "TIMESTAMP", "At or before (ISO 8601 or YYYY-MM-DD)")
        .flag("ids", None, "Print ids only")
}

fn trace_list_node(handler: Handler) -> CommandNode {
    page_options(CommandNode::leaf(
        "list",
        "List traces, one page at a time",
        handler,
    ))
    .single("name", None, "NAME", "Trace name")
    .single("user-id", Some('u'), "ID", "User id")
    .single("session-id", Some('s'), "ID", "Session id")
    .repeatable("tag", Some('t'), "TAG", "Required tag (repeatable)")
}

fn owned(ctx: &CommandContext<'_>, name: &str) -> Option<String> {
    ctx.value(name).map(str::to_string)
}

fn required(ctx: &CommandContext<'_>, name: &str) -> String {
    ctx.arg(name).unwrap_or_default().to_string()
}

fn list_args(ctx: &CommandContext<'_>) -> Result<sessions::ListArgs> {
    Ok(sessions::ListArgs {
        output: ctx.parse_value("output")?,
        limit: ctx.parse_value("limit")?,
        ids: ctx.flag("ids"),
    })
}

fn get_args(ctx: &CommandContext<'_>) -> Result<sessions::GetArgs> {
    Ok(sessions::GetArgs {
        id: required(ctx, "id"),
        output: ctx.parse_value("output")?,
    })
}

fn search_args(ctx: &CommandContext<'_>) -> Result<sessions::SearchArgs> {
    Ok(sessions::SearchArgs {
        query: ctx.arg("query").map(str::to_string),
        labels: ctx.values("label").to_vec(),
        provider: owned(ctx, "provider"),
        model: owned(ctx, "model"),
        function: owned(ctx, "function"),
        after: owned(ctx, "after"),
        before: owned(ctx, "before"),
        has_errors: ctx.flag("has-errors"),
        evals_failed: ctx.flag("evals-failed"),
        output: ctx.parse_value("output")?,
        limit: ctx.parse_value("limit")?,
        ids: ctx.flag("ids"),
    })
}

fn diff_args(ctx: &CommandContext<'_>) -> Result<sessions::DiffArgs> {
    Ok(sessions::DiffArgs {
        left: required(ctx, "left"),
        right: required(ctx, "right"),
        output: ctx.parse_value("output")?,
    })
}

fn page_args(ctx: &CommandContext<'_>) -> Result<langfuse::PageArgs> {
    Ok(langfuse::PageArgs {
        output: ctx.parse_value("output")?,
        limit: ctx.parse_value("limit")?,
        page: ctx.parse_value("page")?,
        from: owned(ctx, "from"),
        to: owned(ctx, "to"),
        ids: ctx.flag("ids"),
    })
}

fn trace_list_args(ctx: &CommandContext<'_>) -> Result<langfuse::TraceListArgs> {
    Ok(langfuse::TraceListArgs {
        page: page_args(ctx)?,
        name: owned(ctx, "name"),
        user_id: owned(ctx, "user-id"),
        session_id: owned(ctx, "session-id"),
        tags: ctx.values("tag").to_vec(),
    })
}

fn langfuse_get_args(ctx: &CommandContext<'_>) -> Result<langfuse::GetArgs> {
    Ok(langfuse::GetArgs {
        id: required(ctx, "id"),
        output: ctx.parse_value("output")?,
    })
}

fn routed_sessions_list(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    let args = sessions::RoutedListArgs {
        list: list_args(ctx)?,
        page: ctx.parse_value("page")?,
        from: owned(ctx, "from"),
        to: owned(ctx, "to"),
    };
    sessions::route_list(app, &args)?;
    Ok(Flow::Continue)
}

fn routed_sessions_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::route_get(app, &get_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn routed_sessions_search(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::route_search(app, &search_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn routed_sessions_diff(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::route_diff(app, &diff_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn routed_traces_list(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    traces::list(app, &trace_list_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn routed_traces_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    traces::get(app, &langfuse_get_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn aiobs_sessions_list(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::list(app, &list_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn aiobs_sessions_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::get(app, &get_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn aiobs_sessions_search(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::search(app, &search_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn aiobs_sessions_diff(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    sessions::diff(app, &diff_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn langfuse_traces_list(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    langfuse::list_traces(app, &trace_list_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn langfuse_traces_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    langfuse::get_trace(app, &langfuse_get_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn langfuse_sessions_list(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    langfuse::list_sessions(app, &page_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn langfuse_sessions_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    langfuse::get_session(app, &langfuse_get_args(ctx)?)?;
    Ok(Flow::Continue)
}

fn config_init(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    let args = config::InitArgs {
        provider: owned(ctx, "provider"),
        api_key: owned(ctx, "api-key"),
        endpoint: owned(ctx, "endpoint"),
        public_key: owned(ctx, "public-key"),
        secret_key: owned(ctx, "secret-key"),
        host: owned(ctx, "host"),
    };
    config::init(app, &args)?;
    Ok(Flow::Continue)
}

fn config_show(app: &mut App, _: &CommandContext<'_>) -> Result<Flow> {
    config::show(app)?;
    Ok(Flow::Continue)
}

fn config_get(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    config::get(app, ctx.arg("key").unwrap_or_default())?;
    Ok(Flow::Continue)
}

fn config_set(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    config::set(
        app,
        ctx.arg("key").unwrap_or_default(),
        ctx.arg("value").unwrap_or_default(),
    )?;
    Ok(Flow::Continue)
}

fn help(app: &mut App, ctx: &CommandContext<'_>) -> Result<Flow> {
    let registry = ctx.registry();
    let out = app.out();

    let Some(topic) = ctx.arg("command") else {
        write_overview(out, registry)?;
        return Ok(Flow::Continue);
    };

    let path: Vec<&str> = topic
        .split_whitespace()
        .map(|word| word.strip_prefix('/').unwrap_or(word))
        .collect();
    let node = registry
        .find(&path)
        .ok_or_else(|| DispatchError::UnknownCommand(path.join(" ")))?;
    let path = path.join(" ");

    writeln!(out, "{}", node.about)?;
    writeln!(out)?;
    writeln!(out, "{} {}", "Usage:".bold(), node.usage(&path))?;

    if !node.args.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Arguments:".bold())?;
        for arg in &node.args {
            writeln!(out, "  {}", arg.name)?;
        }
    }
    if !node.options.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Options:".bold())?;
        for option in &node.options {
            writeln!(out, "  {:<28} {}", option.label(), option.help.dimmed())?;
        }
    }
    if node.is_group() {
        writeln!(out)?;
        writeln!(out, "{}", "Subcommands:".bold())?;
        for child in &node.children {
            writeln!(out, "  {:<10} {}", child.name.cyan(), child.about)?;
        }
    }
    Ok(Flow::Continue)
}

fn write_overview(out: &mut dyn Write, registry: &Registry) -> Result<()> {
    writeln!(out, "{}", "Commands:".bold())?;
    for command in registry.commands() {
        writeln!(
            out,
            "  {} {}",
            format!("{:<10}", command.name).cyan(),
            command.about
        )?;
        for child in &command.children {
            writeln!(out, "    {:<8} {}", child.name, child.about.dimmed())?;
        }
    }
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        "Type 'help <command>' for options. A leading '/' is optional.".dimmed()
    )?;
    Ok(())
}

fn clear(app: &mut App, _: &CommandContext<'_>) -> Result<Flow> {
    let mut ansi = String::new();
    Clear(ClearType::All).write_ansi(&mut ansi)?;
    MoveTo(0, 0).write_ansi(&mut ansi)?;

    let out = app.out();
    write!(out, "{ansi}")?;
    out.flush()?;
    Ok(Flow::Continue)
}

fn show_version(app: &mut App, _: &CommandContext<'_>) -> Result<Flow> {
    version::run(app)?;
    Ok(Flow::Continue)
}

fn exit(_: &mut App, _: &CommandContext<'_>) -> Result<Flow> {
    Ok(Flow::Exit)
}
