//! Liveness probe for external resources referenced by generated scripts.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport-level probe failure (DNS, connect, timeout).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// Checks whether a URL answers at all. The caller decides what the status
/// code means; this trait only reports it.
#[async_trait]
pub trait ReachabilityProbe {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError>;
}

/// HEAD-request probe with a bounded per-request timeout.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| ProbeError(err.to_string()))?;
        Ok(response.status().as_u16())
    }
}
