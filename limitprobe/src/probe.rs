use crate::error::HarnessError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::time::{Duration, Instant};

/// Outcome of a single probe against the target.
///
/// A `ProbeResult` only ever carries an HTTP status — policy rejections are
/// first-class outcomes. A transport failure never becomes a `ProbeResult`;
/// it aborts the dispatch it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Logical key the probe targeted, used as the URL path.
    pub key: String,
    /// HTTP status code returned by the target.
    pub status: u16,
    /// Wall-clock instant the request was issued.
    pub start: DateTime<Utc>,
    /// Elapsed time until the status line was observed.
    pub duration: Duration,
}

impl ProbeResult {
    pub fn is_accepted(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client issuing one GET per probe.
///
/// Deliberately unadorned: no retries and no client-side timeout, so the
/// first real outcome of every probe is the one recorded.
#[derive(Debug, Clone)]
pub struct Prober {
    base_url: Url,
    client: reqwest::Client,
}

impl Prober {
    pub fn new(base_url: &str) -> Result<Self, HarnessError> {
        let base_url = Url::parse(base_url).map_err(|_| HarnessError::InvalidUrl)?;
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    /// Issues exactly one GET against `base_url` + `key` and records timing.
    ///
    /// `start` is captured immediately before the request is written and
    /// `duration` when the status line arrives. The body is discarded.
    pub async fn get(&self, key: &str) -> Result<ProbeResult, HarnessError> {
        let url = self
            .base_url
            .join(key)
            .map_err(|_| HarnessError::InvalidUrl)?;
        let start = Utc::now();
        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        let duration = started.elapsed();
        let status = response.status().as_u16();
        // Drain the body so keep-alive connections stay reusable.
        response.bytes().await.ok();
        Ok(ProbeResult {
            key: key.to_string(),
            status,
            start,
            duration,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
