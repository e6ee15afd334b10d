//! Upstream ads.txt client
//!
//! Requests the ads.txt document for a domain from the publisher endpoint.
//! The response body is returned as-is whatever the status code; only
//! transport failures are errors. No charset decoding is applied: bytes that
//! are not UTF-8 are replaced rather than reinterpreted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// Endpoint prefix the domain is appended to
pub const DEFAULT_ENDPOINT: &str = "https://kumo.network-n.com/adstxt/?domain=";

/// Request timeout used when none is configured
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when fetching the ads.txt document
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, timeout or body read failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Source of fresh ads.txt documents
#[async_trait]
pub trait AdsTxtSource: Send + Sync {
    /// Fetches the document for `domain`, or the endpoint default when absent
    async fn fetch(&self, domain: Option<&str>) -> Result<String, FetchError>;
}

/// Client for the remote ads.txt endpoint
#[derive(Debug, Clone)]
pub struct AdsTxtClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Prefix the domain is appended to
    endpoint: String,
}

impl AdsTxtClient {
    /// Creates a client for the default endpoint
    pub fn new() -> Result<Self, FetchError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a client for a custom endpoint prefix and timeout
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the request URL by plain concatenation
    ///
    /// An absent or empty domain yields the bare prefix.
    pub fn request_url(&self, domain: Option<&str>) -> String {
        match domain.filter(|d| !d.is_empty()) {
            Some(domain) => format!("{}{}", self.endpoint, domain),
            None => self.endpoint.clone(),
        }
    }
}

#[async_trait]
impl AdsTxtSource for AdsTxtClient {
    async fn fetch(&self, domain: Option<&str>) -> Result<String, FetchError> {
        let url = self.request_url(domain);

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%url, error = %e, "ads.txt body is not valid UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        tracing::debug!(%url, %status, bytes = body.len(), "fetched ads.txt");
        Ok(body)
    }
}
