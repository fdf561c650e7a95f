//! HTTP client for sitemap downloads and liveness probes.

use crate::errors::{Result, SyncError};
use futures::stream::{self, StreamExt};
use reqwest::{redirect, Client};
use std::time::Duration;

/// Response to a GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Response to a HEAD request. Redirects are reported, never followed.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub url: String,
    pub status: u16,
}

/// Shared HTTP client pair: one following redirects for downloads, one
/// that never follows them for probes.
#[derive(Clone)]
pub struct HttpClient {
    fetch: Client,
    probe: Client,
    probe_timeout: Duration,
}

impl HttpClient {
    pub fn new(probe_timeout: Duration) -> Result<Self> {
        let user_agent = concat!("sitemap-sync/", env!("CARGO_PKG_VERSION"));
        let fetch = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| SyncError::Configuration(format!("http client: {e}")))?;
        let probe = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| SyncError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            fetch,
            probe,
            probe_timeout,
        })
    }

    /// GET `url` and read the body as text.
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        let fetch_err = |reason: String| SyncError::Fetch {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .fetch
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }

    /// HEAD `url` without following redirects, bounded by the probe timeout.
    pub async fn head(&self, url: &str) -> Result<HeadResponse> {
        let resp = self
            .probe
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| SyncError::Probe {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(HeadResponse {
            url: url.to_string(),
            status: resp.status().as_u16(),
        })
    }

    /// HEAD every URL with at most `concurrency` requests in flight.
    ///
    /// Results come back in input order.
    pub async fn head_many(
        &self,
        urls: &[String],
        concurrency: usize,
    ) -> Vec<Result<HeadResponse>> {
        stream::iter(urls)
            .map(|url| self.head(url))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
