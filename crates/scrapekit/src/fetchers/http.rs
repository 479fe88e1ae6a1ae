//! HTTP fetcher
//!
//! Issues a single GET with caller headers layered over a browser-like
//! default user agent. Any payload is decoded as text so the extractor
//! always receives a document.

use crate::error::FetchError;
use crate::fetchers::Fetcher;
use crate::types::{FetchRequest, FetchedDocument};
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// reqwest-based static fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with the default user agent
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Create a fetcher with a custom default user agent
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument, FetchError> {
        if !request.url.starts_with("http://") && !request.url.starts_with("https://") {
            return Err(FetchError::InvalidUrl);
        }

        let headers = build_headers(&self.user_agent, &request.headers);
        let timeout = Duration::from_millis(request.timeout_ms);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        let deadline = tokio::time::Instant::now() + timeout;

        let response = client
            .get(&request.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, request.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = read_body_until(response, deadline, request.timeout_ms).await?;
        debug!(url = %request.url, status = status.as_u16(), size = body.len(), "Fetched document");

        Ok(FetchedDocument {
            markup: String::from_utf8_lossy(&body).into_owned(),
            status_code: status.as_u16(),
            content_type,
        })
    }
}

/// Layer caller headers over the defaults, caller winning key by key
///
/// Header names compare case-insensitively, so a caller `user-agent`
/// replaces the default `User-Agent`. Unusable names or values are dropped.
fn build_headers(user_agent: &str, overrides: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

    for (name, value) in overrides {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid request header"),
        }
    }

    headers
}

/// Read the whole response body before `deadline`
///
/// Unlike a truncating reader, a body that does not finish in time is a
/// timeout: the pipeline then falls back to rendering.
async fn read_body_until(
    response: reqwest::Response,
    deadline: tokio::time::Instant,
    timeout_ms: u64,
) -> Result<Bytes, FetchError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                    Some(Err(e)) => return Err(FetchError::from_reqwest(e, timeout_ms)),
                    None => return Ok(Bytes::from(body)),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!(received = body.len(), "Body timeout reached");
                return Err(FetchError::Timeout(timeout_ms));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let headers = build_headers(DEFAULT_USER_AGENT, &HashMap::new());
        assert_eq!(headers.get(USER_AGENT).unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(headers.get(ACCEPT).unwrap(), DEFAULT_ACCEPT);
    }

    #[test]
    fn test_caller_headers_take_precedence() {
        let mut overrides = HashMap::new();
        overrides.insert("user-agent".to_string(), "CustomBot/1.0".to_string());
        overrides.insert("X-Api-Key".to_string(), "secret".to_string());

        let headers = build_headers(DEFAULT_USER_AGENT, &overrides);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "CustomBot/1.0");
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(headers.get_all(USER_AGENT).iter().count(), 1);
    }

    #[test]
    fn test_invalid_headers_dropped() {
        let mut overrides = HashMap::new();
        overrides.insert("bad header".to_string(), "value".to_string());
        overrides.insert("X-Ok".to_string(), "line\nbreak".to_string());

        let headers = build_headers(DEFAULT_USER_AGENT, &overrides);
        assert_eq!(headers.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = HttpFetcher::new();
        let request = FetchRequest {
            url: "ftp://example.com/file.txt".to_string(),
            headers: HashMap::new(),
            timeout_ms: 1000,
        };
        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl)));
    }
}
