//! Observability providers.
//!
//! Sessions are never stored locally: every command fetches them fresh.
//! AIOBS sessions come through a `SessionProvider`; Langfuse traces and
//! sessions through a `langfuse::TraceProvider`. `default_provider` in the
//! config picks which one the top-level commands use.
//!
//! # Submodules
//!
//! - `client` - Blocking HTTP client for the AIOBS API, plus the request
//!   helpers both clients share
//! - `models` - AIOBS wire types and their reduction to `Session` summaries
//! - `langfuse` - Langfuse client, wire types and trait

pub mod client;
pub mod langfuse;
pub mod models;

pub use client::AiobsClient;
pub use models::{Evaluation, Event, FunctionEvent, SessionInfo, SessionsResponse, TraceNode};

use std::fmt;
use std::str::FromStr;

/// Default AIOBS API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://shepherd-api.aiobs.dev";

/// Environment variable holding the API key. Takes precedence over the
/// config file when set.
pub const API_KEY_ENV: &str = "AIOBS_API_KEY";

/// Name of the AIOBS provider.
pub const AIOBS_PROVIDER: &str = "aiobs";

/// Name of the Langfuse provider.
pub const LANGFUSE_PROVIDER: &str = "langfuse";

/// A selectable provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// AIOBS sessions; supports search and diff
    Aiobs,
    /// Langfuse traces and sessions
    Langfuse,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Aiobs, Provider::Langfuse];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Aiobs => AIOBS_PROVIDER,
            Provider::Langfuse => LANGFUSE_PROVIDER,
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|p| p.name()).collect();
                format!("supported providers: {}", names.join(", "))
            })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The requested session does not exist.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The requested trace does not exist.
    #[error("Trace not found: {0}")]
    TraceNotFound(String),

    /// The credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network or transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("Unexpected response from server: {0}")]
    Decode(String),

    /// The configured endpoint is not a usable base URL.
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Source of raw session data.
///
/// Calls block until the fetch completes or fails. There is no
/// cancellation; a timeout, if any, belongs to the implementation.
pub trait SessionProvider {
    /// Fetches every session visible to the caller.
    fn list_sessions(&self) -> Result<SessionsResponse, ProviderError>;

    /// Fetches one session with its events and trace tree.
    fn get_session(&self, session_id: &str) -> Result<SessionsResponse, ProviderError>;
}
