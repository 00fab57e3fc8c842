//! HTTP client for the AIOBS sessions API.
//!
//! Provides `AiobsClient`, a blocking client used by the session commands.
//! Requests carry the API key as a bearer token and a fixed timeout; there
//! is no retry logic. The request helpers at the bottom are shared with the
//! Langfuse client.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ProviderError, SessionProvider, SessionsResponse};

/// Blocking client for the AIOBS API.
pub struct AiobsClient {
    /// HTTP client instance.
    client: Client,
    /// Base URL of the service, without a trailing slash.
    endpoint: Url,
    /// API key sent as a bearer token.
    api_key: String,
}

impl AiobsClient {
    /// Creates a client for the given endpoint.
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            api_key: api_key.to_string(),
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        join_url(&self.endpoint, segments)
    }

    fn fetch(&self, url: Url, session_id: Option<&str>) -> Result<SessionsResponse, ProviderError> {
        let request = self.client.get(url).bearer_auth(&self.api_key);
        send_json(request, || {
            ProviderError::NotFound(session_id.unwrap_or("requested resource").to_string())
        })
    }
}

impl SessionProvider for AiobsClient {
    fn list_sessions(&self) -> Result<SessionsResponse, ProviderError> {
        let url = self.url(&["v1", "sessions"])?;
        self.fetch(url, None)
    }

    fn get_session(&self, session_id: &str) -> Result<SessionsResponse, ProviderError> {
        let url = self.url(&["v1", "sessions", session_id])?;
        self.fetch(url, Some(session_id))
    }
}

/// Builds the blocking HTTP client with the shared user agent.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("shepherd/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Appends path segments to a base URL, percent-encoding each one.
pub(crate) fn join_url(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ProviderError::InvalidEndpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends a request and decodes a JSON body. A 404 becomes the error built
/// by `not_found`.
pub(crate) fn send_json<T, F>(request: RequestBuilder, not_found: F) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: FnOnce() -> ProviderError,
{
    let response = request.send()?;
    let url = response.url().clone();
    tracing::debug!("GET {url}");

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::debug!("{url} returned {status}");
        return Err(classify_status(status, body, not_found));
    }

    let body = response.text()?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Parses and validates an endpoint base URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, ProviderError> {
    let invalid = || ProviderError::InvalidEndpoint(endpoint.to_string());
    let url = Url::parse(endpoint.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid());
    }
    Ok(url)
}

/// Maps a non-success status to a provider error.
fn classify_status<F>(status: StatusCode, body: String, not_found: F) -> ProviderError
where
    F: FnOnce() -> ProviderError,
{
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let message = if body.trim().is_empty() {
                "invalid credentials".to_string()
            } else {
                body
            };
            ProviderError::Authentication(message)
        }
        StatusCode::NOT_FOUND => not_found(),
        _ => ProviderError::Server {
            status: status.as_u16(),
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> AiobsClient {
        AiobsClient::new(endpoint, "test_key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_endpoint_trailing_slash() {
        assert_eq!(
            client("https://custom.example.com/").endpoint(),
            "https://custom.example.com"
        );
    }

    #[test]
    fn test_client_rejects_invalid_endpoint() {
        let result = AiobsClient::new("not a url", "k", Duration::from_secs(1));
        assert!(matches!(result, Err(ProviderError::InvalidEndpoint(_))));

        let result = AiobsClient::new("ftp://example.com", "k", Duration::from_secs(1));
        assert!(matches!(result, Err(ProviderError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_session_url_encodes_id() {
        let c = client("https://api.example.com");
        let url = c.url(&["v1", "sessions", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/sessions/a%20b%2Fc");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let c = client("https://example.com/aiobs/");
        let url = c.url(&["v1", "sessions"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/aiobs/v1/sessions");
    }

    fn session_not_found() -> ProviderError {
        ProviderError::NotFound("abc".to_string())
    }

    #[test]
    fn test_classify_unauthorized() {
        let err = classify_status(StatusCode::UNAUTHORIZED, String::new(), session_not_found);
        assert!(matches!(err, ProviderError::Authentication(ref m) if m == "invalid credentials"));
    }

    #[test]
    fn test_classify_not_found_uses_callback() {
        let err = classify_status(StatusCode::NOT_FOUND, "nope".to_string(), session_not_found);
        assert!(matches!(err, ProviderError::NotFound(ref id) if id == "abc"));

        let err = classify_status(StatusCode::NOT_FOUND, String::new(), || {
            ProviderError::TraceNotFound("t1".to_string())
        });
        assert!(matches!(err, ProviderError::TraceNotFound(ref id) if id == "t1"));
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_status(StatusCode::BAD_GATEWAY, "upstream".to_string(), session_not_found);
        match err {
            ProviderError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
