//! Wire types for the AIOBS sessions API.
//!
//! These mirror the JSON the service returns. Every collection defaults to
//! empty and unknown fields are ignored so that newer server versions do
//! not break older clients. Timestamps are float Unix seconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::session::Session;

/// Response body of both the list and get endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsResponse {
    #[serde(default)]
    pub sessions: Vec<SessionInfo>,

    /// LLM provider calls across all returned sessions
    #[serde(default)]
    pub events: Vec<Event>,

    /// Instrumented function calls across all returned sessions
    #[serde(default)]
    pub function_events: Vec<FunctionEvent>,

    /// Calls arranged by span parentage
    #[serde(default)]
    pub trace_tree: Vec<TraceNode>,

    #[serde(default)]
    pub generated_at: Option<f64>,

    #[serde(default)]
    pub version: Option<u32>,
}

/// Session header as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub started_at: f64,

    #[serde(default)]
    pub ended_at: Option<f64>,

    /// Process metadata captured at session start (pid, cwd, ...)
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// One LLM provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub provider: String,

    #[serde(default)]
    pub api: String,

    #[serde(default)]
    pub request: Option<Value>,

    #[serde(default)]
    pub response: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub started_at: f64,

    #[serde(default)]
    pub ended_at: f64,

    #[serde(default)]
    pub duration_ms: f64,

    #[serde(default)]
    pub span_id: Option<String>,

    #[serde(default)]
    pub parent_span_id: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

impl Event {
    /// Model named in the request, falling back to the response.
    pub fn model(&self) -> Option<&str> {
        [&self.request, &self.response]
            .into_iter()
            .flatten()
            .find_map(|body| body.get("model").and_then(Value::as_str))
    }

    /// Total tokens reported in the response usage block.
    pub fn total_tokens(&self) -> Option<u64> {
        self.response
            .as_ref()?
            .get("usage")?
            .get("total_tokens")?
            .as_u64()
    }
}

/// One instrumented function call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEvent {
    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub api: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub args: Option<Value>,

    #[serde(default)]
    pub kwargs: Option<Value>,

    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub started_at: f64,

    #[serde(default)]
    pub ended_at: f64,

    #[serde(default)]
    pub duration_ms: f64,

    #[serde(default)]
    pub span_id: Option<String>,

    #[serde(default)]
    pub parent_span_id: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

impl FunctionEvent {
    /// Display name: the function name, or the api path when unnamed.
    pub fn function_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.api)
    }
}

/// Result of an automated evaluation run against an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub passed: Option<bool>,

    #[serde(default)]
    pub score: Option<f64>,
}

/// Node of the call tree, linked by span ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceNode {
    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub api: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub request: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub duration_ms: f64,

    /// "provider" for LLM calls, "function" for function calls
    #[serde(default)]
    pub event_type: String,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    pub fn is_function(&self) -> bool {
        self.event_type == "function"
    }

    pub fn model(&self) -> Option<&str> {
        self.request.as_ref()?.get("model")?.as_str()
    }
}

/// Per-session accumulator used while reducing events.
#[derive(Default)]
struct EventSummary<'a> {
    first_call: Option<&'a Event>,
    providers: BTreeSet<String>,
    models: BTreeSet<String>,
    functions: BTreeSet<String>,
    has_errors: bool,
    evals_failed: bool,
    llm_calls: usize,
    function_calls: usize,
}

impl<'a> EventSummary<'a> {
    fn add_event(&mut self, event: &'a Event) {
        self.llm_calls += 1;
        self.has_errors |= event.error.is_some();
        self.evals_failed |= any_failed(&event.evaluations);
        if !event.provider.is_empty() {
            self.providers.insert(event.provider.clone());
        }
        if let Some(model) = event.model() {
            self.models.insert(model.to_string());
        }
        if self
            .first_call
            .map_or(true, |first| event.started_at < first.started_at)
        {
            self.first_call = Some(event);
        }
    }

    fn add_function(&mut self, event: &'a FunctionEvent) {
        self.function_calls += 1;
        self.has_errors |= event.error.is_some();
        self.evals_failed |= any_failed(&event.evaluations);
        self.functions.insert(event.function_name().to_string());
    }
}

fn owner<'a>(session_id: &'a Option<String>, single: Option<&'a str>) -> Option<&'a str> {
    session_id.as_deref().or(single)
}

fn any_failed(evaluations: &[Evaluation]) -> bool {
    evaluations.iter().any(|e| e.passed == Some(false))
}

impl SessionsResponse {
    /// Reduces the response to one `Session` summary per session header,
    /// in response order.
    ///
    /// Events are attributed by `session_id`. Events without one are
    /// attributed to the only session when the response holds exactly one.
    pub fn summarize(&self) -> Vec<Session> {
        let single = match self.sessions.as_slice() {
            [only] => Some(only.id.as_str()),
            _ => None,
        };

        let mut summaries: HashMap<&str, EventSummary> = HashMap::new();
        for event in &self.events {
            if let Some(id) = owner(&event.session_id, single) {
                summaries.entry(id).or_default().add_event(event);
            }
        }
        for event in &self.function_events {
            if let Some(id) = owner(&event.session_id, single) {
                summaries.entry(id).or_default().add_function(event);
            }
        }

        self.sessions
            .iter()
            .map(|info| {
                let summary = summaries.remove(info.id.as_str()).unwrap_or_default();
                Session {
                    id: info.id.clone(),
                    name: info.name.clone(),
                    started_at: timestamp(info.started_at),
                    ended_at: info.ended_at.map(timestamp),
                    provider: summary.first_call.map(|e| e.provider.clone()),
                    model: summary
                        .first_call
                        .and_then(Event::model)
                        .map(str::to_string),
                    providers: summary.providers,
                    models: summary.models,
                    functions: summary.functions,
                    labels: info.labels.clone(),
                    has_errors: summary.has_errors,
                    evals_failed: summary.evals_failed,
                    llm_calls: summary.llm_calls,
                    function_calls: summary.function_calls,
                }
            })
            .collect()
    }

    /// LLM calls belonging to the given session.
    pub fn events_for<'a>(&'a self, session_id: &'a str) -> impl Iterator<Item = &'a Event> {
        let single = self.sessions.len() == 1;
        self.events.iter().filter(move |e| match &e.session_id {
            Some(id) => id.as_str() == session_id,
            None => single,
        })
    }
}

/// Converts float Unix seconds to a UTC timestamp, clamping values
/// outside chrono's range to the epoch.
pub fn timestamp(seconds: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64).unwrap_or_default()
}
