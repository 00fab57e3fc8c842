//! HTTP client for the Langfuse public API.
//!
//! Authenticates with HTTP basic auth: the public key is the user name and
//! the secret key the password.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;

use super::{
    LangfuseSession, PageQuery, SessionsPage, Trace, TraceProvider, TraceQuery, TracesPage,
};
use crate::provider::client::{http_client, join_url, parse_endpoint, send_json};
use crate::provider::ProviderError;

/// Blocking client for the Langfuse API.
pub struct LangfuseClient {
    client: Client,
    host: Url,
    public_key: String,
    secret_key: String,
}

impl LangfuseClient {
    pub fn new(
        host: &str,
        public_key: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            host: parse_endpoint(host)?,
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut path = vec!["api", "public"];
        path.extend_from_slice(segments);
        join_url(&self.host, &path)
    }

    fn get<T, F>(
        &self,
        url: Url,
        params: &[(&str, String)],
        not_found: F,
    ) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce() -> ProviderError,
    {
        let request = self
            .client
            .get(url)
            .query(params)
            .basic_auth(&self.public_key, Some(&self.secret_key));
        send_json(request, not_found)
    }
}

/// Query parameters for a page request.
fn page_params(query: &PageQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", query.page.to_string()),
        ("limit", query.limit.to_string()),
    ];
    if let Some(from) = query.from {
        params.push(("fromTimestamp", timestamp_param(from)));
    }
    if let Some(to) = query.to {
        params.push(("toTimestamp", timestamp_param(to)));
    }
    params
}

fn trace_params(query: &TraceQuery) -> Vec<(&'static str, String)> {
    let mut params = page_params(&query.page);
    let optional = [
        ("name", &query.name),
        ("userId", &query.user_id),
        ("sessionId", &query.session_id),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            params.push((key, value.clone()));
        }
    }
    params.extend(query.tags.iter().map(|tag| ("tags", tag.clone())));
    params
}

/// A 404 on a list endpoint means the host is not a Langfuse server.
fn missing_endpoint() -> ProviderError {
    ProviderError::Server {
        status: 404,
        message: "endpoint not found; check langfuse.host".to_string(),
    }
}

fn timestamp_param(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl TraceProvider for LangfuseClient {
    fn list_traces(&self, query: &TraceQuery) -> Result<TracesPage, ProviderError> {
        let url = self.url(&["traces"])?;
        self.get(url, &trace_params(query), missing_endpoint)
    }

    fn get_trace(&self, trace_id: &str) -> Result<Trace, ProviderError> {
        let url = self.url(&["traces", trace_id])?;
        self.get(url, &[], || ProviderError::TraceNotFound(trace_id.to_string()))
    }

    fn list_sessions(&self, query: &PageQuery) -> Result<SessionsPage, ProviderError> {
        let url = self.url(&["sessions"])?;
        self.get(url, &page_params(query), missing_endpoint)
    }

    fn get_session(&self, session_id: &str) -> Result<LangfuseSession, ProviderError> {
        let url = self.url(&["sessions", session_id])?;
        self.get(url, &[], || ProviderError::NotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client(host: &str) -> LangfuseClient {
        LangfuseClient::new(host, "pk-lf-1", "sk-lf-1", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls_live_under_public_api() {
        let c = client("https://cloud.langfuse.com/");
        assert_eq!(c.host(), "https://cloud.langfuse.com");
        assert_eq!(
            c.url(&["traces", "a/b"]).unwrap().as_str(),
            "https://cloud.langfuse.com/api/public/traces/a%2Fb"
        );
    }

    #[test]
    fn test_self_hosted_base_path_is_kept() {
        let c = client("http://localhost:3000/langfuse");
        assert_eq!(
            c.url(&["sessions"]).unwrap().as_str(),
            "http://localhost:3000/langfuse/api/public/sessions"
        );
    }

    #[test]
    fn test_rejects_invalid_host() {
        let result = LangfuseClient::new("nope", "pk", "sk", Duration::from_secs(1));
        assert!(matches!(result, Err(ProviderError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_page_params() {
        let query = PageQuery {
            page: 2,
            limit: 10,
            from: Some(Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()),
            to: None,
        };
        assert_eq!(
            page_params(&query),
            vec![
                ("page", "2".to_string()),
                ("limit", "10".to_string()),
                ("fromTimestamp", "2025-12-01T00:00:00Z".to_string()),
            ]
        );
    }

    #[test]
    fn test_trace_params_repeat_tags() {
        let query = TraceQuery {
            name: Some("checkout".to_string()),
            tags: vec!["prod".to_string(), "beta".to_string()],
            ..Default::default()
        };
        let params = trace_params(&query);
        assert!(params.contains(&("name", "checkout".to_string())));
        let tags: Vec<_> = params.iter().filter(|(k, _)| *k == "tags").collect();
        assert_eq!(tags.len(), 2);
        assert!(!params.iter().any(|(k, _)| *k == "userId"));
    }
}
