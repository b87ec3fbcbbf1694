//! HTTP client for archive requests.
//!
//! Thin wrapper over reqwest that turns status codes and transport failures
//! into [`FetchError`] variants the retry layer understands.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::trace;

use crate::rate_limit::{parse_retry_after, Retryable};

/// Default user agent for archive requests.
pub const USER_AGENT: &str = "listing-history/0.1 (research; price history recovery)";

/// A failed HTTP request.
///
/// The `Display` form is what gets recorded against a failed work item.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("not_found")]
    NotFound,
    /// 429 or 503: back off harder and try again.
    #[error("http_{status}")]
    Throttled {
        status: u16,
        retry_after: Option<Duration>,
    },
    /// Other 5xx responses.
    #[error("http_{0}")]
    Server(u16),
    /// 4xx other than 404 and 429.
    #[error("http_{0}")]
    Status(u16),
    #[error("timeout")]
    Timeout,
    #[error("network: {0}")]
    Network(String),
    #[error("body: {0}")]
    Body(String),
}

impl FetchError {
    /// Classify a non-success status code.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>) -> Self {
        match status.as_u16() {
            404 => FetchError::NotFound,
            429 | 503 => FetchError::Throttled {
                status: status.as_u16(),
                retry_after,
            },
            code if status.is_server_error() => FetchError::Server(code),
            code => FetchError::Status(code),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() || e.is_body() {
            FetchError::Body(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Throttled { .. }
                | FetchError::Server(_)
                | FetchError::Timeout
                | FetchError::Network(_)
                | FetchError::Body(_)
        )
    }

    fn is_throttled(&self) -> bool {
        matches!(self, FetchError::Throttled { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Throttled { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// HTTP client shared by the index and content fetchers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    /// Set the user agent string.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    pub fn build(self) -> Result<HttpClient, FetchError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(HttpClient { client })
    }
}

impl HttpClient {
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            user_agent: None,
        }
    }

    /// GET a URL and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        trace!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(FetchError::from_status(status, retry_after));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            FetchError::from_status(StatusCode::NOT_FOUND, None),
            FetchError::NotFound
        );
        assert!(FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, None).is_throttled());
        assert!(FetchError::from_status(StatusCode::BAD_GATEWAY, None).is_transient());
        assert!(!FetchError::from_status(StatusCode::FORBIDDEN, None).is_transient());
        assert!(!FetchError::NotFound.is_transient());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(FetchError::NotFound.to_string(), "not_found");
        assert_eq!(FetchError::Status(403).to_string(), "http_403");
        assert_eq!(
            FetchError::Throttled {
                status: 503,
                retry_after: None
            }
            .to_string(),
            "http_503"
        );
    }
}
