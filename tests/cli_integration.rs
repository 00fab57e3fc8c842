//! Integration tests for Shepherd CLI commands
//!
//! These tests drive the command handlers and the shell loop through the
//! library with in-memory AIOBS and Langfuse providers and a temporary
//! config directory, plus a few end-to-end runs of the built binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use shepherd_cli::app::App;
use shepherd_cli::cli::commands::{aiobs, config, langfuse, sessions, traces};
use shepherd_cli::cli::OutputFormat;
use shepherd_cli::config::ConfigError;
use shepherd_cli::provider::langfuse::{
    LangfuseSession, PageQuery, SessionsPage, Trace, TraceProvider, TraceQuery, TracesPage,
};
use shepherd_cli::provider::{Provider, ProviderError, SessionProvider, SessionsResponse};
use shepherd_cli::query::{self, FilterOptions, FilterSpec, QueryOutput};
use shepherd_cli::session::Session;
use shepherd_cli::shell::commands::build_registry;
use shepherd_cli::shell::editor::PipedReader;
use shepherd_cli::shell::history::History;
use shepherd_cli::shell::{self, ShellState};
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;
use tempfile::{tempdir, TempDir};

// =============================================================================
// Test Helpers
// =============================================================================

/// Output sink whose contents stay readable after being handed to an `App`.
#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Serves a fixed response, narrowing it to one session for `get_session`.
struct FakeProvider {
    response: SessionsResponse,
}

impl SessionProvider for FakeProvider {
    fn list_sessions(&self) -> Result<SessionsResponse, ProviderError> {
        Ok(self.response.clone())
    }

    fn get_session(&self, session_id: &str) -> Result<SessionsResponse, ProviderError> {
        let owned = |id: &Option<String>| id.as_deref() == Some(session_id);
        let sessions: Vec<_> = self
            .response
            .sessions
            .iter()
            .filter(|s| s.id == session_id)
            .cloned()
            .collect();
        if sessions.is_empty() {
            return Err(ProviderError::NotFound(session_id.to_string()));
        }
        Ok(SessionsResponse {
            sessions,
            events: self
                .response
                .events
                .iter()
                .filter(|e| owned(&e.session_id))
                .cloned()
                .collect(),
            function_events: self
                .response
                .function_events
                .iter()
                .filter(|e| owned(&e.session_id))
                .cloned()
                .collect(),
            ..Default::default()
        })
    }
}

/// Three sessions: "a" on Dec 1 (openai), "b" on Dec 5 (anthropic, with an
/// error and a failed evaluation), "c" on Dec 3 (openai, no calls).
fn fixture_response() -> SessionsResponse {
    serde_json::from_value(json!({
        "sessions": [
            {
                "id": "a",
                "name": "summarize-docs",
                "started_at": 1764590400.0,
                "ended_at": 1764590412.5,
                "labels": {"env": "prod", "team": "search"}
            },
            {
                "id": "b",
                "name": "triage-bot",
                "started_at": 1764936000.0,
                "ended_at": 1764936030.0,
                "labels": {"env": "staging"}
            },
            {
                "id": "c",
                "name": "nightly-eval",
                "started_at": 1764763200.0,
                "labels": {"env": "prod", "team": "infra"}
            }
        ],
        "events": [
            {
                "provider": "openai",
                "api": "chat.completions.create",
                "request": {"model": "gpt-4o-mini"},
                "response": {"usage": {"total_tokens": 120}},
                "started_at": 1764590401.0,
                "ended_at": 1764590402.0,
                "duration_ms": 1000.0,
                "session_id": "a"
            },
            {
                "provider": "anthropic",
                "api": "messages.create",
                "request": {"model": "claude-sonnet"},
                "error": {"type": "overloaded"},
                "started_at": 1764936001.0,
                "ended_at": 1764936002.0,
                "duration_ms": 900.0,
                "session_id": "b",
                "evaluations": [{"name": "groundedness", "passed": false}]
            }
        ],
        "function_events": [
            {
                "provider": "function",
                "api": "load_documents",
                "name": "load_documents",
                "started_at": 1764590400.5,
                "ended_at": 1764590400.8,
                "duration_ms": 300.0,
                "session_id": "a"
            }
        ]
    }))
    .expect("fixture is valid")
}

fn test_app(dir: &TempDir) -> (App, SharedBuffer) {
    colored::control::set_override(false);
    let buffer = SharedBuffer::default();
    let app = App::with_output(dir.path().join("config.yaml"), Box::new(buffer.clone()))
        .with_provider(Rc::new(FakeProvider {
            response: fixture_response(),
        }));
    (app, buffer)
}

/// Serves fixed Langfuse data and remembers the last trace query.
#[derive(Default)]
struct FakeTraceProvider {
    last_query: RefCell<Option<TraceQuery>>,
    last_page: RefCell<Option<PageQuery>>,
}

fn fixture_traces() -> TracesPage {
    serde_json::from_value(json!({
        "data": [
            {
                "id": "trace-checkout-1",
                "timestamp": "2025-12-01T10:00:00Z",
                "name": "checkout",
                "sessionId": "lf-session-1",
                "tags": ["prod"],
                "latency": 2.5,
                "observations": [
                    {"id": "obs-1", "type": "SPAN", "name": "pipeline", "latency": 2400.0},
                    {"id": "obs-2", "type": "GENERATION", "name": "llm", "model": "gpt-4o",
                     "parentObservationId": "obs-1", "latency": 1800.0,
                     "usage": {"input": 120, "output": 30, "total": 150}}
                ]
            },
            {
                "id": "trace-refund-2",
                "timestamp": "2025-12-02T09:00:00Z",
                "name": "refund",
                "tags": ["beta"]
            }
        ],
        "meta": {"page": 1, "limit": 50, "totalItems": 2, "totalPages": 1}
    }))
    .expect("fixture is valid")
}

impl TraceProvider for FakeTraceProvider {
    fn list_traces(&self, query: &TraceQuery) -> Result<TracesPage, ProviderError> {
        *self.last_query.borrow_mut() = Some(query.clone());
        Ok(fixture_traces())
    }

    fn get_trace(&self, trace_id: &str) -> Result<Trace, ProviderError> {
        fixture_traces()
            .data
            .into_iter()
            .find(|t| t.id == trace_id)
            .ok_or_else(|| ProviderError::TraceNotFound(trace_id.to_string()))
    }

    fn list_sessions(&self, query: &PageQuery) -> Result<SessionsPage, ProviderError> {
        *self.last_page.borrow_mut() = Some(query.clone());
        Ok(serde_json::from_value(json!({
            "data": [
                {"id": "lf-session-1", "createdAt": "2025-12-01T10:00:00Z",
                 "userIds": ["alice"], "countTraces": 1}
            ],
            "meta": {"page": query.page, "limit": query.limit, "totalItems": 1, "totalPages": 1}
        }))
        .expect("fixture is valid"))
    }

    fn get_session(&self, session_id: &str) -> Result<LangfuseSession, ProviderError> {
        if session_id != "lf-session-1" {
            return Err(ProviderError::NotFound(session_id.to_string()));
        }
        Ok(LangfuseSession {
            id: session_id.to_string(),
            traces: fixture_traces().data.into_iter().take(1).collect(),
            ..Default::default()
        })
    }
}

/// An app wired to both fakes, with `provider` as the default provider.
fn routed_app(dir: &TempDir, provider: Provider) -> (App, SharedBuffer, Rc<FakeTraceProvider>) {
    let (app, buffer) = test_app(dir);
    let traces = Rc::new(FakeTraceProvider::default());
    let app = app.with_trace_provider(traces.clone());
    let mut setup = App::with_output(app.config_path().to_path_buf(), Box::new(Vec::new()));
    config::set(&mut setup, "provider", provider.name()).unwrap();
    (app, buffer, traces)
}

fn unsupported(err: &anyhow::Error) -> Option<(Provider, &'static str)> {
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Unsupported {
            provider,
            operation,
            ..
        }) => Some((*provider, *operation)),
        _ => None,
    }
}

fn fixture_sessions() -> Vec<Session> {
    fixture_response().summarize()
}

fn ids(output: &QueryOutput) -> Vec<String> {
    match output {
        QueryOutput::Ids(ids) => ids.clone(),
        QueryOutput::Sessions(sessions) => sessions.iter().map(|s| s.id.clone()).collect(),
    }
}

fn spec(options: FilterOptions) -> FilterSpec {
    FilterSpec::parse(&options).expect("valid filter")
}

// =============================================================================
// Query Engine
// =============================================================================

#[test]
fn test_fixture_summaries() {
    let sessions = fixture_sessions();
    let b = sessions.iter().find(|s| s.id == "b").unwrap();
    assert_eq!(b.provider.as_deref(), Some("anthropic"));
    assert_eq!(b.model.as_deref(), Some("claude-sonnet"));
    assert!(b.has_errors);
    assert!(b.evals_failed);

    let a = sessions.iter().find(|s| s.id == "a").unwrap();
    assert!(a.functions.contains("load_documents"));
    assert_eq!(a.llm_calls, 1);
    assert_eq!(a.function_calls, 1);
}

#[test]
fn test_query_scenarios() {
    let provider = spec(FilterOptions {
        provider: Some("openai".to_string()),
        ..Default::default()
    });
    assert_eq!(ids(&query::execute(&provider, fixture_sessions())), ["a"]);

    let errors = spec(FilterOptions {
        has_errors: true,
        ..Default::default()
    });
    assert_eq!(ids(&query::execute(&errors, fixture_sessions())), ["b"]);

    let after = spec(FilterOptions {
        after: Some("2025-12-02".to_string()),
        ..Default::default()
    });
    assert_eq!(ids(&query::execute(&after, fixture_sessions())), ["b", "c"]);
}

#[test]
fn test_query_is_idempotent() {
    let spec = spec(FilterOptions {
        labels: vec!["env=prod".to_string()],
        ..Default::default()
    });
    let once = query::select(&spec, fixture_sessions());
    let twice = query::select(&spec, once.clone());
    assert_eq!(once, twice);
}

#[test]
fn test_limit_returns_prefix() {
    let unlimited = query::select(&FilterSpec::default(), fixture_sessions());
    for n in 1..=5 {
        let limited = spec(FilterOptions {
            limit: Some(n),
            ..Default::default()
        });
        let result = ids(&query::execute(&limited, fixture_sessions()));
        assert_eq!(result.len(), n.min(unlimited.len()));
        let prefix: Vec<String> = unlimited.iter().take(n).map(|s| s.id.clone()).collect();
        assert_eq!(result, prefix);
    }
}

#[test]
fn test_ids_only_matches_full_result() {
    let full = spec(FilterOptions {
        labels: vec!["env=prod".to_string()],
        ..Default::default()
    });
    let ids_only = spec(FilterOptions {
        labels: vec!["env=prod".to_string()],
        ids_only: true,
        ..Default::default()
    });
    let full = query::execute(&full, fixture_sessions());
    let projected = query::execute(&ids_only, fixture_sessions());
    assert!(matches!(projected, QueryOutput::Ids(_)));
    assert_eq!(ids(&projected), ids(&full));
    assert_eq!(ids(&projected), ["c", "a"]);
}

#[test]
fn test_labels_all_must_match() {
    let both = spec(FilterOptions {
        labels: vec!["env=prod".to_string(), "team=search".to_string()],
        ..Default::default()
    });
    assert_eq!(ids(&query::execute(&both, fixture_sessions())), ["a"]);

    let same_key = spec(FilterOptions {
        labels: vec!["env=prod".to_string(), "env=staging".to_string()],
        ..Default::default()
    });
    assert!(query::execute(&same_key, fixture_sessions()).is_empty());
}

// =============================================================================
// Sessions Commands
// =============================================================================

#[test]
fn test_sessions_list_table() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    sessions::list(&mut app, &sessions::ListArgs::default()).unwrap();

    let output = buffer.text();
    assert!(output.contains("summarize-docs"));
    assert!(output.contains("triage-bot"));
    assert!(output.contains("3 session(s)"));
    let b = output.find("triage-bot").unwrap();
    let a = output.find("summarize-docs").unwrap();
    assert!(b < a, "most recent session comes first");
}

#[test]
fn test_sessions_list_ids_with_limit() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::ListArgs {
        limit: Some(2),
        ids: true,
        ..Default::default()
    };
    sessions::list(&mut app, &args).unwrap();

    assert_eq!(buffer.text(), "b\nc\n");
}

#[test]
fn test_sessions_list_json() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::ListArgs {
        output: Some(OutputFormat::Json),
        ..Default::default()
    };
    sessions::list(&mut app, &args).unwrap();

    let value: serde_json::Value = serde_json::from_str(&buffer.text()).unwrap();
    let listed = value["sessions"].as_array().unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0]["id"], "b");
}

#[test]
fn test_sessions_list_uses_configured_format() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);
    let mut setup = App::with_output(app.config_path().to_path_buf(), Box::new(Vec::new()));
    config::set(&mut setup, "output_format", "json").unwrap();

    sessions::list(&mut app, &sessions::ListArgs::default()).unwrap();

    assert!(buffer.text().trim_start().starts_with('{'));
}

#[test]
fn test_sessions_search_filters() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::SearchArgs {
        function: Some("load_documents".to_string()),
        ids: true,
        ..Default::default()
    };
    sessions::search(&mut app, &args).unwrap();

    assert_eq!(buffer.text(), "a\n");
}

#[test]
fn test_sessions_search_no_match() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::SearchArgs {
        query: Some("does-not-exist".to_string()),
        ..Default::default()
    };
    sessions::search(&mut app, &args).unwrap();

    assert!(buffer.text().contains("No sessions found."));
}

#[test]
fn test_sessions_search_rejects_bad_date() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::SearchArgs {
        after: Some("12/01/2025".to_string()),
        ..Default::default()
    };
    let err = sessions::search(&mut app, &args).unwrap_err();

    assert!(err.to_string().contains("12/01/2025"));
    assert!(buffer.text().is_empty());
}

#[test]
fn test_sessions_get_detail() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::GetArgs {
        id: "b".to_string(),
        ..Default::default()
    };
    sessions::get(&mut app, &args).unwrap();

    let output = buffer.text();
    assert!(output.contains("triage-bot"));
    assert!(output.contains("anthropic / claude-sonnet"));
    assert!(output.contains("errors recorded"));
    assert!(output.contains("LLM Calls"));
}

#[test]
fn test_sessions_get_unknown_id() {
    let dir = tempdir().unwrap();
    let (mut app, _) = test_app(&dir);

    let args = sessions::GetArgs {
        id: "zzz".to_string(),
        ..Default::default()
    };
    let err = sessions::get(&mut app, &args).unwrap_err();

    assert!(err.to_string().contains("Session not found: zzz"));
}

#[test]
fn test_sessions_diff() {
    let dir = tempdir().unwrap();
    let (mut app, buffer) = test_app(&dir);

    let args = sessions::DiffArgs {
        left: "a".to_string(),
        right: "b".to_string(),
        ..Default::default()
    };
    sessions::diff(&mut app, &args).unwrap();

    let output = buffer.text();
    assert!(output.contains("a vs b"));
    assert!(output.contains("provider"));
    assert!(output.contains("anthropic"));
    assert!(output.contains("- load_documents"));
}

// =============================================================================
// Provider Routing
// =============================================================================

#[test]
fn test_routed_list_uses_aiobs_by_default() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, traces) = routed_app(&dir, Provider::Aiobs);

    let args = sessions::RoutedListArgs {
        list: sessions::ListArgs {
            ids: true,
            ..Default::default()
        },
        page: Some(2),
        ..Default::default()
    };
    sessions::route_list(&mut app, &args).unwrap();

    assert_eq!(buffer.text(), "b\nc\na\n");
    assert!(traces.last_page.borrow().is_none());
}

#[test]
fn test_routed_list_under_langfuse() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, traces) = routed_app(&dir, Provider::Langfuse);

    let args = sessions::RoutedListArgs {
        page: Some(3),
        from: Some("2025-12-01".to_string()),
        ..Default::default()
    };
    sessions::route_list(&mut app, &args).unwrap();

    let query = traces.last_page.borrow().clone().unwrap();
    assert_eq!(query.page, 3);
    assert_eq!(query.limit, 50);
    assert!(query.from.is_some());
    let output = buffer.text();
    assert!(output.contains("lf-session-1"));
    assert!(output.contains("alice"));
}

#[test]
fn test_routed_get_under_langfuse() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, _) = routed_app(&dir, Provider::Langfuse);

    let args = sessions::GetArgs {
        id: "lf-session-1".to_string(),
        ..Default::default()
    };
    sessions::route_get(&mut app, &args).unwrap();

    let output = buffer.text();
    assert!(output.contains("Session Info"));
    assert!(output.contains("checkout"));
}

#[test]
fn test_search_and_diff_unsupported_under_langfuse() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, _) = routed_app(&dir, Provider::Langfuse);

    let err = sessions::route_search(&mut app, &sessions::SearchArgs::default()).unwrap_err();
    assert_eq!(unsupported(&err), Some((Provider::Langfuse, "session search")));
    assert!(err.to_string().contains("shepherd aiobs sessions search"));

    let args = sessions::DiffArgs {
        left: "a".to_string(),
        right: "b".to_string(),
        ..Default::default()
    };
    let err = sessions::route_diff(&mut app, &args).unwrap_err();
    assert_eq!(unsupported(&err), Some((Provider::Langfuse, "session diff")));
    assert!(buffer.text().is_empty());
}

#[test]
fn test_explicit_aiobs_search_under_langfuse() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, _) = routed_app(&dir, Provider::Langfuse);

    let args = aiobs::Args {
        command: aiobs::AiobsCommand::Sessions {
            command: aiobs::SessionsCommand::Search(sessions::SearchArgs {
                provider: Some("OpenAI".to_string()),
                ids: true,
                ..Default::default()
            }),
        },
    };
    aiobs::run(&mut app, args).unwrap();

    assert_eq!(buffer.text(), "a\n");
}

#[test]
fn test_traces_unsupported_under_aiobs() {
    let dir = tempdir().unwrap();
    let (mut app, _, traces) = routed_app(&dir, Provider::Aiobs);

    let err = traces::list(&mut app, &langfuse::TraceListArgs::default()).unwrap_err();
    assert_eq!(unsupported(&err), Some((Provider::Aiobs, "traces")));
    assert!(err.to_string().contains("shepherd config set provider langfuse"));
    assert!(traces.last_query.borrow().is_none());
}

#[test]
fn test_traces_list_under_langfuse() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, traces) = routed_app(&dir, Provider::Langfuse);

    let args = langfuse::TraceListArgs {
        session_id: Some("lf-session-1".to_string()),
        tags: vec!["prod".to_string()],
        ..Default::default()
    };
    traces::list(&mut app, &args).unwrap();

    let query = traces.last_query.borrow().clone().unwrap();
    assert_eq!(query.session_id.as_deref(), Some("lf-session-1"));
    assert_eq!(query.tags, ["prod"]);
    let output = buffer.text();
    assert!(output.contains("checkout"));
    assert!(output.contains("Page 1/1 (2 total traces)"));
}

#[test]
fn test_langfuse_trace_get_works_under_aiobs() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, _) = routed_app(&dir, Provider::Aiobs);

    let args = langfuse::GetArgs {
        id: "trace-checkout-1".to_string(),
        ..Default::default()
    };
    langfuse::get_trace(&mut app, &args).unwrap();

    let output = buffer.text();
    assert!(output.contains("Trace Info"));
    assert!(output.contains("gpt-4o"));
}

#[test]
fn test_langfuse_trace_get_unknown_id() {
    let dir = tempdir().unwrap();
    let (mut app, _, _) = routed_app(&dir, Provider::Langfuse);

    let args = langfuse::GetArgs {
        id: "nope".to_string(),
        ..Default::default()
    };
    let err = langfuse::get_trace(&mut app, &args).unwrap_err();
    assert!(err.to_string().contains("Trace not found: nope"));
}

#[test]
fn test_langfuse_sessions_list_json() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, _) = routed_app(&dir, Provider::Aiobs);

    let args = langfuse::PageArgs {
        output: Some(OutputFormat::Json),
        ..Default::default()
    };
    langfuse::list_sessions(&mut app, &args).unwrap();

    let value: serde_json::Value = serde_json::from_str(&buffer.text()).unwrap();
    assert_eq!(value["sessions"][0]["id"], "lf-session-1");
}

// =============================================================================
// Shell
// =============================================================================

fn run_shell(dir: &TempDir, input: &str) -> (ShellState, String) {
    let (mut app, buffer) = test_app(dir);
    let history = History::load(&dir.path().join("history")).unwrap();
    let state = ShellState::new(Rc::new(build_registry()), history);
    let mut reader = PipedReader::new(Cursor::new(input.to_string()));

    let state = shell::run_with(&mut app, state, &mut reader).unwrap();
    (state, buffer.text())
}

#[test]
fn test_shell_unknown_command_keeps_running() {
    let dir = tempdir().unwrap();
    let (_, output) = run_shell(&dir, "sesions list\nsessions list --ids\nexit\n");

    assert!(output.contains("Error:"));
    assert!(output.contains("sesions"));
    assert!(output.contains("b\nc\na\n"));
}

#[test]
fn test_shell_config_error_continues() {
    let dir = tempdir().unwrap();
    let (_, output) = run_shell(&dir, "config get missing_key\nversion\n");

    assert!(output.contains("Unknown config key 'missing_key'"));
    assert!(output.contains("shepherd v"));
}

#[test]
fn test_shell_slash_prefix_and_quotes() {
    let dir = tempdir().unwrap();
    let (_, output) = run_shell(
        &dir,
        "/sessions search --label \"team=search\" --ids\nquit\nversion\n",
    );

    assert!(output.starts_with("a\n"));
    assert!(!output.contains("shepherd v"), "nothing runs after quit");
}

#[test]
fn test_shell_records_history() {
    let dir = tempdir().unwrap();
    let (state, _) = run_shell(&dir, "version\n\nsesions\nhelp sessions\nexit\n");

    assert_eq!(state.history.entries(), ["version", "help sessions", "exit"]);
    let saved = std::fs::read_to_string(dir.path().join("history")).unwrap();
    assert_eq!(saved, "version\nhelp sessions\nexit\n");

    let reloaded = History::load(&dir.path().join("history")).unwrap();
    assert_eq!(reloaded.len(), 3);
}

#[test]
fn test_shell_provider_subtrees() {
    let dir = tempdir().unwrap();
    let (mut app, buffer, traces) = routed_app(&dir, Provider::Aiobs);
    let history = History::load(&dir.path().join("history")).unwrap();
    let state = ShellState::new(Rc::new(build_registry()), history);
    let input = "traces list\n\
        langfuse traces list -t prod --ids\n\
        aiobs sessions search -p openai --ids\n\
        exit\n";
    let mut reader = PipedReader::new(Cursor::new(input.to_string()));

    shell::run_with(&mut app, state, &mut reader).unwrap();

    let output = buffer.text();
    assert!(output.contains("does not support traces"));
    assert!(output.contains("trace-checkout-1\ntrace-refund-2\na\n"));
    let query = traces.last_query.borrow().clone().unwrap();
    assert_eq!(query.tags, ["prod"]);
}

#[test]
fn test_shell_end_of_input_exits() {
    let dir = tempdir().unwrap();
    let (state, output) = run_shell(&dir, "");

    assert!(state.history.is_empty());
    assert!(output.is_empty());
}

#[test]
fn test_shell_unterminated_quote() {
    let dir = tempdir().unwrap();
    let (state, output) = run_shell(&dir, "sessions get \"abc\nexit\n");

    assert!(output.contains("Error:"));
    assert!(output.contains("quote"));
    assert_eq!(state.history.entries(), ["exit"]);
}

// =============================================================================
// Binary
// =============================================================================

fn shepherd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shepherd").unwrap();
    cmd.env("SHEPHERD_HOME", home.path())
        .env_remove("AIOBS_API_KEY")
        .env_remove("LANGFUSE_PUBLIC_KEY")
        .env_remove("LANGFUSE_SECRET_KEY")
        .env_remove("LANGFUSE_HOST")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_binary_version() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "shepherd v{}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_binary_config_get_unknown_key_fails() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .args(["config", "get", "missing_key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing_key"));
}

#[test]
fn test_binary_config_set_then_get() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .args(["config", "set", "endpoint", "http://localhost:8080"])
        .assert()
        .success();
    shepherd(&home)
        .args(["config", "get", "aiobs.endpoint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:8080"));
    assert!(home.path().join("config.yaml").exists());
}

#[test]
fn test_binary_sessions_without_api_key_fails() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_binary_piped_shell() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .write_stdin("sesions list\nversion\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error:"))
        .stdout(predicate::str::contains("shepherd v"));
    assert!(home.path().join("history").exists());
}

#[test]
fn test_binary_traces_need_langfuse() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .args(["traces", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Provider 'aiobs' does not support traces",
        ));
}

#[test]
fn test_binary_search_needs_aiobs() {
    let home = tempdir().unwrap();
    shepherd(&home)
        .args(["config", "set", "provider", "langfuse"])
        .assert()
        .success();
    shepherd(&home)
        .args(["sessions", "search", "checkout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not support session search"));
    shepherd(&home)
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Langfuse API keys not configured"));
}
