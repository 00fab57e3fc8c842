//! Rendering for Langfuse traces and sessions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Write;

use super::{format_duration, truncate_to_width};
use crate::provider::langfuse::{
    LangfuseSession, Observation, ObservationRef, PageMeta, SessionsPage, Trace, TracesPage,
};

const TRACE_ID_WIDTH: usize = 15;
const SESSION_ID_WIDTH: usize = 23;
const NAME_WIDTH: usize = 24;
const TIME_WIDTH: usize = 19;
const NUM_WIDTH: usize = 8;
const USER_WIDTH: usize = 15;

/// Rows shown in the nested LLM call and trace tables.
const MAX_ROWS: usize = 10;

const INPUT_PREVIEW: usize = 500;
const OUTPUT_PREVIEW: usize = 800;

#[derive(Serialize)]
struct TracesDocument<'a> {
    traces: &'a [Trace],
    meta: &'a Option<PageMeta>,
}

#[derive(Serialize)]
struct SessionsDocument<'a> {
    sessions: &'a [LangfuseSession],
    meta: &'a Option<PageMeta>,
}

/// `{"traces": [...], "meta": {...}}` as pretty JSON.
pub fn traces_json(out: &mut dyn Write, page: &TracesPage) -> Result<()> {
    pretty_json(
        out,
        &TracesDocument {
            traces: &page.data,
            meta: &page.meta,
        },
    )
}

/// `{"sessions": [...], "meta": {...}}` as pretty JSON.
pub fn sessions_json(out: &mut dyn Write, page: &SessionsPage) -> Result<()> {
    pretty_json(
        out,
        &SessionsDocument {
            sessions: &page.data,
            meta: &page.meta,
        },
    )
}

/// Any record as pretty JSON.
pub fn pretty_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// A page of traces as an aligned table with a pagination footer.
pub fn traces_table(out: &mut dyn Write, page: &TracesPage) -> Result<()> {
    if page.data.is_empty() {
        writeln!(out, "{}", "No traces found.".yellow())?;
        return Ok(());
    }

    writeln!(
        out,
        "{}",
        format!(
            "{:<TRACE_ID_WIDTH$}  {:<NAME_WIDTH$}  {:<TIME_WIDTH$}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {:<USER_WIDTH$}  {}",
            "ID", "NAME", "TIMESTAMP", "LATENCY", "COST", "USER", "TAGS"
        )
        .bold()
    )?;

    for trace in &page.data {
        let user = trace
            .user_id
            .as_deref()
            .map(|u| short(u, 12))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{}  {:<NAME_WIDTH$}  {}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {:<USER_WIDTH$}  {}",
            format!("{:<TRACE_ID_WIDTH$}", short(&trace.id, 12)).dimmed(),
            truncate_to_width(trace.name.as_deref().unwrap_or("-"), NAME_WIDTH),
            format!("{:<TIME_WIDTH$}", format_timestamp(trace.timestamp)).green(),
            format_seconds(trace.latency),
            format_cost(trace.total_cost),
            user,
            format_tags(&trace.tags).dimmed(),
        )?;
    }

    write_footer(out, page.meta.as_ref(), page.data.len(), "traces")
}

/// A page of sessions as an aligned table with a pagination footer.
pub fn sessions_table(out: &mut dyn Write, page: &SessionsPage) -> Result<()> {
    if page.data.is_empty() {
        writeln!(out, "{}", "No sessions found.".yellow())?;
        return Ok(());
    }

    writeln!(
        out,
        "{}",
        format!(
            "{:<SESSION_ID_WIDTH$}  {:<TIME_WIDTH$}  {:>6}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {}",
            "ID", "CREATED", "TRACES", "DURATION", "TOKENS", "COST", "USERS"
        )
        .bold()
    )?;

    for session in &page.data {
        let mut users = session
            .user_ids
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if session.user_ids.len() > 2 {
            users.push_str("...");
        }
        if users.is_empty() {
            users.push('-');
        }

        writeln!(
            out,
            "{}  {}  {:>6}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}  {}",
            format!("{:<SESSION_ID_WIDTH$}", short(&session.id, 20)).dimmed(),
            format!("{:<TIME_WIDTH$}", format_timestamp(session.created_at)).green(),
            session.trace_count(),
            format_millis(session.session_duration),
            format_tokens(session.total_tokens),
            format_cost(session.total_cost),
            users.dimmed(),
        )?;
    }

    write_footer(out, page.meta.as_ref(), page.data.len(), "sessions")
}

fn write_footer(
    out: &mut dyn Write,
    meta: Option<&PageMeta>,
    shown: usize,
    noun: &str,
) -> Result<()> {
    let Some(meta) = meta else {
        return Ok(());
    };
    let total = meta.total_items.unwrap_or(shown as u64);
    let page = meta.page.unwrap_or(1);
    let pages = meta.total_pages.unwrap_or(1);
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("Page {page}/{pages} ({total} total {noun})").dimmed()
    )?;
    Ok(())
}

/// Header, observation tree, LLM calls and previews for one trace.
pub fn trace_detail(out: &mut dyn Write, trace: &Trace) -> Result<()> {
    writeln!(out, "{}", "Trace Info".bold())?;
    field(out, "Trace:  ", &trace.id.cyan().to_string())?;
    field(out, "Name:   ", trace.name.as_deref().unwrap_or("-"))?;
    field(out, "Time:   ", &format_timestamp(trace.timestamp))?;
    field(out, "Latency:", &format_seconds(trace.latency))?;
    field(out, "Cost:   ", &format_cost(trace.total_cost))?;
    let optional = [
        ("User:   ", trace.user_id.clone()),
        ("Session:", trace.session_id.clone()),
        ("Tags:   ", (!trace.tags.is_empty()).then(|| trace.tags.join(", "))),
        ("Release:", trace.release.clone()),
        ("Version:", trace.version.clone()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            field(out, label, &value)?;
        }
    }

    if !trace.observations.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Trace Tree".bold())?;
        writeln!(out, "{}", trace.name.as_deref().unwrap_or(&trace.id).bold())?;
        write_observation_tree(out, trace)?;

        let generations = trace.generations();
        if !generations.is_empty() {
            write_llm_calls(out, &generations)?;
        }
    }

    if trace.observations.is_empty() {
        if let Some(input) = &trace.input {
            writeln!(out)?;
            writeln!(out, "{}", "Input".bold())?;
            writeln!(out, "{}", clip(&value_text(input), INPUT_PREVIEW))?;
        }
    }
    if let Some(output) = &trace.output {
        writeln!(out)?;
        writeln!(out, "{}", "Output".bold())?;
        writeln!(out, "{}", clip(&value_text(output), INPUT_PREVIEW))?;
    }
    Ok(())
}

fn write_observation_tree(out: &mut dyn Write, trace: &Trace) -> Result<()> {
    let full: Vec<&Observation> = trace.full_observations().collect();
    if full.is_empty() {
        for (i, observation) in trace.observations.iter().enumerate() {
            if let ObservationRef::Id(id) = observation {
                let branch = if i + 1 == trace.observations.len() { "└── " } else { "├── " };
                writeln!(out, "{branch}{}", id.dimmed())?;
            }
        }
        writeln!(
            out,
            "{}",
            format!(
                "{} observation IDs (use 'traces get' for details)",
                trace.observations.len()
            )
            .dimmed()
        )?;
        return Ok(());
    }

    // Observations whose parent is absent from the trace render as roots.
    let known: HashSet<&str> = full.iter().map(|o| o.id.as_str()).collect();
    let mut children: HashMap<Option<&str>, Vec<&Observation>> = HashMap::new();
    for observation in &full {
        let parent = observation
            .parent_observation_id
            .as_deref()
            .filter(|p| known.contains(p));
        children.entry(parent).or_default().push(observation);
    }

    let roots = children.get(&None).cloned().unwrap_or_default();
    for (i, root) in roots.iter().enumerate() {
        write_observation(out, root, &children, "", i + 1 == roots.len())?;
    }
    Ok(())
}

fn write_observation(
    out: &mut dyn Write,
    observation: &Observation,
    children: &HashMap<Option<&str>, Vec<&Observation>>,
    prefix: &str,
    last: bool,
) -> Result<()> {
    let branch = if last { "└── " } else { "├── " };
    let mut label = if observation.is_generation() {
        let model = observation.model.as_deref().unwrap_or("LLM");
        let mut label = model.magenta().bold().to_string();
        if let Some(name) = observation.name.as_deref().filter(|n| *n != model) {
            label.push_str(&format!(" ({name})"));
        }
        label
    } else {
        let mut label = observation.kind.to_lowercase().blue().bold().to_string();
        if let Some(name) = &observation.name {
            label.push(' ');
            label.push_str(name);
        }
        label
    };
    if let Some(latency) = observation.latency.filter(|l| *l > 0.0) {
        label.push_str(&format!(" {}", format_duration(latency).dimmed()));
    }
    if observation.is_generation() {
        if let Some(tokens) = observation.total_tokens() {
            label.push_str(&format!(" {}", format!("{tokens} tok").yellow()));
        }
    }
    writeln!(out, "{prefix}{branch}{label}")?;

    let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
    let kids = children
        .get(&Some(observation.id.as_str()))
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for (i, child) in kids.iter().enumerate() {
        write_observation(out, child, children, &child_prefix, i + 1 == kids.len())?;
    }
    Ok(())
}

fn write_llm_calls(out: &mut dyn Write, generations: &[&Observation]) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "LLM Calls".bold())?;
    writeln!(
        out,
        "{}",
        format!(
            "  {:<24}  {:>8}  {:>7}  {:>7}  {:>7}  {:>8}",
            "MODEL", "DURATION", "IN", "OUT", "TOTAL", "COST"
        )
        .bold()
    )?;

    let count = |n: Option<u64>| n.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
    for generation in generations.iter().take(MAX_ROWS) {
        let usage = generation.usage.clone().unwrap_or_default();
        writeln!(
            out,
            "  {}  {:>8}  {:>7}  {:>7}  {:>7}  {:>8}",
            format!(
                "{:<24}",
                truncate_to_width(generation.model.as_deref().unwrap_or("-"), 24)
            )
            .cyan(),
            generation
                .latency
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string()),
            count(usage.input()),
            count(usage.output()),
            count(usage.total()),
            format_cost(generation.calculated_total_cost),
        )?;
    }
    if generations.len() > MAX_ROWS {
        writeln!(
            out,
            "{}",
            format!("  ... and {} more LLM calls", generations.len() - MAX_ROWS).dimmed()
        )?;
    }

    let first = generations[0];
    if let Some(input) = &first.input {
        writeln!(out)?;
        writeln!(out, "{}", "First LLM Call - Input".bold())?;
        write_messages(out, input)?;
    }
    if let Some(output) = &first.output {
        writeln!(out)?;
        writeln!(out, "{}", "First LLM Call - Output".bold())?;
        write_completion(out, output)?;
    }
    Ok(())
}

/// Chat messages as `role: content` lines.
fn write_messages(out: &mut dyn Write, input: &Value) -> Result<()> {
    let Some(messages) = input.as_array() else {
        writeln!(out, "  {}", clip(&value_text(input), INPUT_PREVIEW))?;
        return Ok(());
    };
    for message in messages {
        let role = message
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let content = message.get("content").map(content_text).unwrap_or_default();
        writeln!(
            out,
            "  {} {}",
            format!("{role}:").color(role_color(role)).bold(),
            clip(&content, INPUT_PREVIEW)
        )?;
    }
    Ok(())
}

/// An assistant reply with its tool calls, or the raw output.
fn write_completion(out: &mut dyn Write, output: &Value) -> Result<()> {
    let role = output.get("role").and_then(Value::as_str);
    let content = output.get("content").and_then(Value::as_str);
    match (role, content) {
        (Some("assistant"), Some(content)) if !content.is_empty() => {
            writeln!(
                out,
                "  {} {}",
                "assistant:".yellow().bold(),
                clip(content, OUTPUT_PREVIEW)
            )?;
            let calls = output
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if !calls.is_empty() {
                writeln!(out, "  {}", "Tool calls:".dimmed())?;
            }
            for call in calls.iter().take(3) {
                let name = call
                    .pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                writeln!(out, "    • {name}")?;
            }
        }
        _ => writeln!(out, "  {}", clip(&value_text(output), OUTPUT_PREVIEW))?,
    }
    Ok(())
}

/// Header, token and cost breakdown, and traces for one session.
pub fn session_detail(out: &mut dyn Write, session: &LangfuseSession) -> Result<()> {
    writeln!(out, "{}", "Session Info".bold())?;
    field(out, "Session: ", &session.id.cyan().to_string())?;
    field(out, "Created: ", &format_timestamp(session.created_at))?;
    field(out, "Traces:  ", &session.trace_count().to_string())?;
    field(out, "Duration:", &format_millis(session.session_duration))?;
    if !session.user_ids.is_empty() {
        field(out, "Users:   ", &session.user_ids.join(", "))?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "Token Usage".bold())?;
    field(out, "Input: ", &format_tokens(session.input_tokens))?;
    field(out, "Output:", &format_tokens(session.output_tokens))?;
    field(out, "Total: ", &format_tokens(session.total_tokens))?;

    writeln!(out)?;
    writeln!(out, "{}", "Cost".bold())?;
    field(out, "Input: ", &format_cost(session.input_cost))?;
    field(out, "Output:", &format_cost(session.output_cost))?;
    field(out, "Total: ", &format_cost(session.total_cost))?;

    if session.traces.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "{}", "Traces".bold())?;
    writeln!(
        out,
        "{}",
        format!(
            "  {:<TRACE_ID_WIDTH$}  {:<NAME_WIDTH$}  {:<TIME_WIDTH$}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}",
            "ID", "NAME", "TIMESTAMP", "LATENCY", "COST"
        )
        .bold()
    )?;
    for trace in session.traces.iter().take(MAX_ROWS) {
        writeln!(
            out,
            "  {}  {:<NAME_WIDTH$}  {}  {:>NUM_WIDTH$}  {:>NUM_WIDTH$}",
            format!("{:<TRACE_ID_WIDTH$}", short(&trace.id, 12)).dimmed(),
            truncate_to_width(trace.name.as_deref().unwrap_or("-"), NAME_WIDTH),
            format!("{:<TIME_WIDTH$}", format_timestamp(trace.timestamp)).green(),
            format_seconds(trace.latency),
            format_cost(trace.total_cost),
        )?;
    }
    if session.traces.len() > MAX_ROWS {
        writeln!(
            out,
            "{}",
            format!("  ... and {} more traces", session.traces.len() - MAX_ROWS).dimmed()
        )?;
    }
    Ok(())
}

fn field(out: &mut dyn Write, label: &str, value: &str) -> Result<()> {
    writeln!(out, "  {}  {value}", label.dimmed())?;
    Ok(())
}

/// `-` for unknown or zero, four decimals under a cent, two otherwise.
pub fn format_cost(cost: Option<f64>) -> String {
    match cost {
        None => "-".to_string(),
        Some(c) if c == 0.0 => "-".to_string(),
        Some(c) if c < 0.01 => format!("${c:.4}"),
        Some(c) => format!("${c:.2}"),
    }
}

/// `-` for unknown or zero, `1.2k` from a thousand up.
pub fn format_tokens(tokens: Option<u64>) -> String {
    match tokens {
        None | Some(0) => "-".to_string(),
        Some(t) if t >= 1000 => format!("{:.1}k", t as f64 / 1000.0),
        Some(t) => t.to_string(),
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_seconds(seconds: Option<f64>) -> String {
    format_millis(seconds.map(|s| s * 1000.0))
}

fn format_millis(ms: Option<f64>) -> String {
    ms.map(format_duration).unwrap_or_else(|| "-".to_string())
}

fn format_tags(tags: &[String]) -> String {
    let mut text = tags.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    if tags.len() > 3 {
        text.push_str("...");
    }
    text
}

/// First `keep` characters plus "..." when longer.
fn short(id: &str, keep: usize) -> String {
    if id.chars().count() > keep {
        let head: String = id.chars().take(keep).collect();
        format!("{head}...")
    } else {
        id.to_string()
    }
}

/// First `max` characters plus "..." when longer.
fn clip(text: &str, max: usize) -> String {
    short(text, max)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Message content as text; content blocks contribute their text parts.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn role_color(role: &str) -> colored::Color {
    use colored::Color;
    match role {
        "system" => Color::Cyan,
        "user" => Color::Green,
        "assistant" => Color::Yellow,
        "function" | "tool" => Color::Magenta,
        _ => Color::White,
    }
}
