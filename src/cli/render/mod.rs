//! Terminal rendering for session results.
//!
//! Everything here writes to a caller-supplied sink so the shell, the
//! one-shot commands and the tests share one code path. Langfuse traces and
//! sessions render in `langfuse`.

pub mod langfuse;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use crate::cli::format::OutputFormat;
use crate::provider::{SessionsResponse, TraceNode};
use crate::query::{QueryOutput, SessionDiff};
use crate::session::Session;

const ID_WIDTH: usize = 11;
const NAME_WIDTH: usize = 24;
const STARTED_WIDTH: usize = 16;
const DURATION_WIDTH: usize = 8;
const EVENTS_WIDTH: usize = 6;
const LABELS_WIDTH: usize = 30;

/// Maximum LLM calls listed in the session detail view.
const MAX_CALL_ROWS: usize = 10;

#[derive(Serialize)]
struct SessionsDocument<'a> {
    sessions: &'a [Session],
}

/// Renders a query result in the requested format.
pub fn query_output(out: &mut dyn Write, output: &QueryOutput, format: OutputFormat) -> Result<()> {
    match output {
        QueryOutput::Ids(ids) => write_ids(out, ids),
        QueryOutput::Sessions(sessions) => match format {
            OutputFormat::Table => sessions_table(out, sessions),
            OutputFormat::Json => sessions_json(out, sessions),
        },
    }
}

/// One id per line, nothing else.
pub fn write_ids(out: &mut dyn Write, ids: &[String]) -> Result<()> {
    for id in ids {
        writeln!(out, "{id}")?;
    }
    Ok(())
}

/// `{"sessions": [...]}` as pretty JSON.
pub fn sessions_json(out: &mut dyn Write, sessions: &[Session]) -> Result<()> {
    let json = serde_json::to_string_pretty(&SessionsDocument { sessions })?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Sessions as an aligned table.
pub fn sessions_table(out: &mut dyn Write, sessions: &[Session]) -> Result<()> {
    if sessions.is_empty() {
        writeln!(out, "{}", "No sessions found.".dimmed())?;
        return Ok(());
    }

    writeln!(
        out,
        "{}",
        format!(
            "{:<ID_WIDTH$}  {:<NAME_WIDTH$}  {:<STARTED_WIDTH$}  {:>DURATION_WIDTH$}  {:>EVENTS_WIDTH$}  {}",
            "ID", "NAME", "STARTED", "DURATION", "EVENTS", "LABELS"
        )
        .bold()
    )?;

    for session in sessions {
        let duration = session
            .duration()
            .map(|d| format_duration(d.num_milliseconds() as f64))
            .unwrap_or_else(|| "-".to_string());
        let events = session.llm_calls + session.function_calls;

        writeln!(
            out,
            "{}  {:<NAME_WIDTH$}  {}  {:>DURATION_WIDTH$}  {:>EVENTS_WIDTH$}  {}",
            format!("{:<ID_WIDTH$}", short_id(&session.id)).cyan(),
            truncate_to_width(&session.name, NAME_WIDTH),
            format!(
                "{:<STARTED_WIDTH$}",
                session.started_at.format("%Y-%m-%d %H:%M").to_string()
            )
            .dimmed(),
            duration,
            events,
            truncate_to_width(&format_labels(session), LABELS_WIDTH).yellow(),
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", format!("{} session(s)", sessions.len()).dimmed())?;
    Ok(())
}

/// The wire response for `sessions get -o json`.
pub fn response_json(out: &mut dyn Write, response: &SessionsResponse) -> Result<()> {
    let json = serde_json::to_string_pretty(response)?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Header, trace tree and LLM calls for one session.
pub fn session_detail(
    out: &mut dyn Write,
    session: &Session,
    response: &SessionsResponse,
) -> Result<()> {
    writeln!(out, "{}", session.name.bold())?;
    writeln!(out, "  {}  {}", "ID:      ".dimmed(), session.id.cyan())?;
    writeln!(
        out,
        "  {}  {}",
        "Started: ".dimmed(),
        session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    if let Some(ended) = session.ended_at {
        writeln!(
            out,
            "  {}  {}",
            "Ended:   ".dimmed(),
            ended.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
    }
    if let Some(duration) = session.duration() {
        writeln!(
            out,
            "  {}  {}",
            "Duration:".dimmed(),
            format_duration(duration.num_milliseconds() as f64)
        )?;
    }
    if let Some(provider) = &session.provider {
        let model = session.model.as_deref().unwrap_or("-");
        writeln!(out, "  {}  {provider} / {model}", "Provider:".dimmed())?;
    }
    writeln!(
        out,
        "  {}  {} LLM, {} function",
        "Events:  ".dimmed(),
        session.llm_calls,
        session.function_calls
    )?;
    if !session.labels.is_empty() {
        writeln!(
            out,
            "  {}  {}",
            "Labels:  ".dimmed(),
            format_labels(session).yellow()
        )?;
    }
    if session.has_errors {
        writeln!(out, "  {}", "✗ errors recorded".red())?;
    }
    if session.evals_failed {
        writeln!(out, "  {}", "✗ evaluations failed".red())?;
    }

    if !response.trace_tree.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Trace".bold())?;
        for (i, node) in response.trace_tree.iter().enumerate() {
            let last = i + 1 == response.trace_tree.len();
            write_trace_node(out, node, "", last)?;
        }
    }

    let calls: Vec<_> = response.events_for(&session.id).collect();
    if !calls.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "LLM Calls".bold())?;
        writeln!(
            out,
            "{}",
            format!(
                "  {:>3}  {:<12}  {:<24}  {:>8}  {:>8}",
                "#", "PROVIDER", "MODEL", "DURATION", "TOKENS"
            )
            .bold()
        )?;
        for (i, call) in calls.iter().take(MAX_CALL_ROWS).enumerate() {
            let tokens = call
                .total_tokens()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            let row = format!(
                "  {:>3}  {:<12}  {:<24}  {:>8}  {:>8}",
                i + 1,
                truncate_to_width(&call.provider, 12),
                truncate_to_width(call.model().unwrap_or("-"), 24),
                format_duration(call.duration_ms),
                tokens
            );
            if call.error.is_some() {
                writeln!(out, "{}", row.red())?;
            } else {
                writeln!(out, "{row}")?;
            }
        }
        if calls.len() > MAX_CALL_ROWS {
            writeln!(
                out,
                "{}",
                format!("  ... and {} more events", calls.len() - MAX_CALL_ROWS).dimmed()
            )?;
        }
    }

    Ok(())
}

fn write_trace_node(out: &mut dyn Write, node: &TraceNode, prefix: &str, last: bool) -> Result<()> {
    let branch = if last { "└── " } else { "├── " };
    let duration = format_duration(node.duration_ms).dimmed();

    let label = if node.is_function() {
        let name = node.name.as_deref().unwrap_or(&node.api);
        format!("{} {}", "fn".magenta(), name)
    } else {
        match node.model() {
            Some(model) => format!("{} {} ({model})", node.provider.blue(), node.api),
            None => format!("{} {}", node.provider.blue(), node.api),
        }
    };

    if node.error.is_some() {
        writeln!(out, "{prefix}{branch}{label} {duration} {}", "✗".red())?;
    } else {
        writeln!(out, "{prefix}{branch}{label} {duration}")?;
    }

    let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
    for (i, child) in node.children.iter().enumerate() {
        write_trace_node(out, child, &child_prefix, i + 1 == node.children.len())?;
    }
    Ok(())
}

/// Renders the differences between two sessions.
pub fn session_diff(out: &mut dyn Write, diff: &SessionDiff, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(diff)?;
        writeln!(out, "{json}")?;
        return Ok(());
    }

    writeln!(
        out,
        "{} {} {}",
        diff.left.id.cyan(),
        "vs".dimmed(),
        diff.right.id.cyan()
    )?;

    if diff.is_empty() {
        writeln!(out, "{}", "No differences.".dimmed())?;
        return Ok(());
    }

    if !diff.fields.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            format!("  {:<16}  {:<28}  {}", "FIELD", "LEFT", "RIGHT").bold()
        )?;
        for change in &diff.fields {
            writeln!(
                out,
                "  {:<16}  {}  {}",
                change.field,
                format!("{:<28}", truncate_to_width(&change.left, 28)).red(),
                change.right.green()
            )?;
        }
    }

    if !diff.labels.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Labels".bold())?;
        for change in &diff.labels {
            let left = change.left.as_deref().unwrap_or("-");
            let right = change.right.as_deref().unwrap_or("-");
            writeln!(out, "  {}: {} -> {}", change.key, left.red(), right.green())?;
        }
    }

    if !diff.functions_only_left.is_empty() || !diff.functions_only_right.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Functions".bold())?;
        for name in &diff.functions_only_left {
            writeln!(out, "  {} {name}", "-".red())?;
        }
        for name in &diff.functions_only_right {
            writeln!(out, "  {} {name}", "+".green())?;
        }
    }

    Ok(())
}

/// Formats a duration in milliseconds: `850ms`, `12.3s`, `4.5m`.
pub fn format_duration(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{}ms", ms.round() as i64)
    } else if ms < 60_000.0 {
        format!("{:.1}s", ms / 1000.0)
    } else {
        format!("{:.1}m", ms / 60_000.0)
    }
}

/// Truncates a string to at most `max_width` characters, ending in "..."
/// when shortened.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        ".".repeat(max_width)
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{kept}...")
    }
}

fn short_id(id: &str) -> String {
    if id.chars().count() > 8 {
        let head: String = id.chars().take(8).collect();
        format!("{head}...")
    } else {
        id.to_string()
    }
}

fn format_labels(session: &Session) -> String {
    if session.labels.is_empty() {
        return "-".to_string();
    }
    session
        .labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            name: "nightly-eval".to_string(),
            started_at: Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap(),
            ended_at: Some(Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 12).unwrap()),
            provider: Some("openai".to_string()),
            model: Some("gpt-4".to_string()),
            providers: ["openai".to_string()].into(),
            models: ["gpt-4".to_string()].into(),
            functions: BTreeSet::new(),
            labels: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            has_errors: false,
            evals_failed: false,
            llm_calls: 2,
            function_calls: 1,
        }
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(850.0), "850ms");
        assert_eq!(format_duration(12_345.0), "12.3s");
        assert_eq!(format_duration(270_000.0), "4.5m");
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("hello world", 8), "hello...");
        assert_eq!(truncate_to_width("hello", 2), "..");
        assert_eq!(truncate_to_width("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("550e8400-e29b"), "550e8400...");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_table_empty() {
        let text = render(|out| sessions_table(out, &[]));
        assert_eq!(text.trim(), "No sessions found.");
    }

    #[test]
    fn test_table_rows() {
        let text = render(|out| sessions_table(out, &[session("550e8400-e29b")]));
        assert!(text.contains("ID"));
        assert!(text.contains("550e8400..."));
        assert!(text.contains("nightly-eval"));
        assert!(text.contains("12.0s"));
        assert!(text.contains("env=prod"));
        assert!(text.contains("1 session(s)"));
    }

    #[test]
    fn test_json_document_shape() {
        let text = render(|out| sessions_json(out, &[session("a")]));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["sessions"][0]["id"], "a");
        assert_eq!(value["sessions"][0]["labels"]["env"], "prod");
    }

    #[test]
    fn test_ids_one_per_line() {
        let output = QueryOutput::Ids(vec!["b".to_string(), "a".to_string()]);
        let text = render(|out| query_output(out, &output, OutputFormat::Json));
        assert_eq!(text, "b\na\n");
    }

    #[test]
    fn test_detail_trace_tree() {
        let response: SessionsResponse = serde_json::from_str(
            r#"{
                "sessions": [{"id": "s1", "name": "run", "started_at": 1764581400.0}],
                "trace_tree": [{
                    "event_type": "function", "name": "pipeline", "duration_ms": 1500.0,
                    "children": [
                        {"provider": "openai", "api": "chat.completions.create",
                         "request": {"model": "gpt-4"}, "duration_ms": 900.0}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let text = render(|out| session_detail(out, &session("s1"), &response));
        assert!(text.contains("Trace"));
        assert!(text.contains("└── fn pipeline 1.5s"));
        assert!(text.contains("    └── openai chat.completions.create (gpt-4) 900ms"));
    }

    #[test]
    fn test_diff_table() {
        let mut right = session("b");
        right.model = Some("gpt-4o".to_string());
        let diff = SessionDiff::new(session("a"), right);
        let text = render(|out| session_diff(out, &diff, OutputFormat::Table));
        assert!(text.contains("a vs b"));
        assert!(text.contains("model"));
        assert!(text.contains("gpt-4o"));
    }
}
