//! Langfuse public API wire types.
//!
//! Field names follow the API's camelCase. Everything except ids is
//! optional: list endpoints return thinner records than detail endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,

    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            meta: None,
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMeta {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub total_items: Option<u64>,
    pub total_pages: Option<u32>,
}

pub type TracesPage = Page<Trace>;
pub type SessionsPage = Page<LangfuseSession>;

/// A Langfuse trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trace {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub release: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub metadata: Option<Value>,

    /// End-to-end latency in seconds
    pub latency: Option<f64>,

    pub total_cost: Option<f64>,

    /// Ids on list endpoints, full records on the detail endpoint
    pub observations: Vec<ObservationRef>,
}

impl Trace {
    /// Full observation records, skipping bare ids.
    pub fn full_observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter_map(|o| match o {
            ObservationRef::Full(observation) => Some(observation.as_ref()),
            ObservationRef::Id(_) => None,
        })
    }

    /// Observations of type `GENERATION`, in trace order.
    pub fn generations(&self) -> Vec<&Observation> {
        self.full_observations()
            .filter(|o| o.is_generation())
            .collect()
    }
}

/// An observation as it appears inside a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationRef {
    Id(String),
    Full(Box<Observation>),
}

/// A span, event or generation within a trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Observation {
    pub id: String,
    pub trace_id: Option<String>,

    /// `SPAN`, `EVENT` or `GENERATION`
    #[serde(rename = "type")]
    pub kind: String,

    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub parent_observation_id: Option<String>,
    pub model: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub usage: Option<Usage>,
    pub level: Option<String>,
    pub status_message: Option<String>,

    /// Latency in milliseconds
    pub latency: Option<f64>,

    pub calculated_total_cost: Option<f64>,
}

impl Observation {
    pub fn is_generation(&self) -> bool {
        self.kind.eq_ignore_ascii_case("GENERATION")
    }

    /// Total tokens, zero treated as unknown.
    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().and_then(Usage::total)
    }
}

/// Token usage of a generation. Older SDKs report the `*Tokens` names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Usage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    pub fn input(&self) -> Option<u64> {
        first_nonzero(self.input, self.input_tokens)
    }

    pub fn output(&self) -> Option<u64> {
        first_nonzero(self.output, self.output_tokens)
    }

    pub fn total(&self) -> Option<u64> {
        first_nonzero(self.total, self.total_tokens)
    }
}

fn first_nonzero(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    a.filter(|n| *n > 0).or(b.filter(|n| *n > 0))
}

/// A Langfuse session: a group of traces sharing a session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LangfuseSession {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub count_traces: Option<u64>,

    /// Duration in milliseconds
    pub session_duration: Option<f64>,

    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub input_cost: Option<f64>,
    pub output_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub user_ids: Vec<String>,
    pub traces: Vec<Trace>,
}

impl LangfuseSession {
    /// Trace count, falling back to the embedded traces.
    pub fn trace_count(&self) -> u64 {
        self.count_traces.unwrap_or(self.traces.len() as u64)
    }
}
