//! Network Fetch Module
//!
//! The fetch primitive the image path depends on, and its reqwest-backed
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::MediaError;

// == Fetch Response ==
/// Raw result of a fetch: status plus body bytes.
///
/// Bodies of non-2xx responses are not downloaded.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Creates a successful response carrying `body`.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Fetcher Trait ==
/// Fetches the bytes behind a media URL.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Issues one request. Transport errors are returned as `Err`; any
    /// received status, including errors, is returned as `Ok`.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, MediaError>;
}

// == HTTP Fetcher ==
/// Pooled HTTP client fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::TransportFailure(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Shared client, reused by the session probe.
    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn classify(&self, err: reqwest::Error) -> MediaError {
        if err.is_timeout() {
            MediaError::Timeout(self.timeout.as_millis() as u64)
        } else {
            MediaError::TransportFailure(err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, MediaError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(FetchResponse {
                status,
                body: Vec::new(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(FetchResponse {
            status,
            body: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_response_success_range() {
        assert!(FetchResponse::ok(vec![1]).is_success());
        assert!(FetchResponse { status: 204, body: vec![] }.is_success());
        assert!(!FetchResponse { status: 301, body: vec![] }.is_success());
        assert!(!FetchResponse { status: 500, body: vec![] }.is_success());
    }

    #[tokio::test]
    async fn test_http_fetcher_transport_failure() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let url = Url::parse("http://127.0.0.1:9/nothing.jpg").unwrap();

        let result = fetcher.fetch(&url).await;
        assert!(matches!(
            result,
            Err(MediaError::TransportFailure(_)) | Err(MediaError::Timeout(_))
        ));
    }
}
