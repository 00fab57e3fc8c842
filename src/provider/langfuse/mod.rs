//! Langfuse traces and sessions.
//!
//! Langfuse pages its list endpoints server-side, so unlike AIOBS there is
//! no client-side query engine here: filters and paging go straight into
//! the request.

pub mod client;
pub mod models;

pub use client::LangfuseClient;
pub use models::{
    LangfuseSession, Observation, ObservationRef, Page, PageMeta, SessionsPage, Trace,
    TracesPage, Usage,
};

use chrono::{DateTime, Utc};

use super::ProviderError;

/// Default Langfuse host.
pub const DEFAULT_HOST: &str = "https://cloud.langfuse.com";

/// Environment variables overriding the stored Langfuse settings.
pub const PUBLIC_KEY_ENV: &str = "LANGFUSE_PUBLIC_KEY";
pub const SECRET_KEY_ENV: &str = "LANGFUSE_SECRET_KEY";
pub const HOST_ENV: &str = "LANGFUSE_HOST";

/// Page size when none is given.
pub const DEFAULT_LIMIT: u32 = 50;

/// Paging and time window shared by the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            from: None,
            to: None,
        }
    }
}

/// Filters for listing traces. All set filters must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceQuery {
    pub page: PageQuery,
    pub name: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
}

/// Source of Langfuse data.
pub trait TraceProvider {
    fn list_traces(&self, query: &TraceQuery) -> Result<TracesPage, ProviderError>;

    /// Fetches one trace with its full observations.
    fn get_trace(&self, trace_id: &str) -> Result<Trace, ProviderError>;

    fn list_sessions(&self, query: &PageQuery) -> Result<SessionsPage, ProviderError>;

    /// Fetches one session with its traces.
    fn get_session(&self, session_id: &str) -> Result<LangfuseSession, ProviderError>;
}
