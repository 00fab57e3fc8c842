//! Session records as seen by the query engine and renderers.
//!
//! A `Session` is a flattened summary of one recorded agent run. It is
//! derived from the provider's wire response (see `provider::models`)
//! and is immutable once built.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One recorded execution trace of an AI agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier assigned by the observability service
    pub id: String,

    /// Human-readable session name
    pub name: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session ended (None if still running or unknown)
    pub ended_at: Option<DateTime<Utc>>,

    /// Provider of the earliest LLM call (e.g., "openai")
    pub provider: Option<String>,

    /// Model of the earliest LLM call (e.g., "gpt-4")
    pub model: Option<String>,

    /// Every provider seen across the session's LLM calls
    #[serde(default)]
    pub providers: BTreeSet<String>,

    /// Every model seen across the session's LLM calls
    #[serde(default)]
    pub models: BTreeSet<String>,

    /// Names of the instrumented functions invoked during the session
    pub functions: BTreeSet<String>,

    /// User-assigned labels
    pub labels: BTreeMap<String, String>,

    /// Whether any LLM call or function call recorded an error
    pub has_errors: bool,

    /// Whether any evaluation attached to the session failed
    pub evals_failed: bool,

    /// Number of LLM calls recorded
    #[serde(default)]
    pub llm_calls: usize,

    /// Number of function calls recorded
    #[serde(default)]
    pub function_calls: usize,
}

impl Session {
    /// Wall-clock duration, when the session has ended.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}
