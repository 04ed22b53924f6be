//! Price lookup boundary.
//!
//! The engine only needs `query text -> first text snippet`; extracting
//! a price out of the snippet is the valuation job's business.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Return the first free-text result for `query`, or `None` when the
    /// service had nothing to say.
    async fn search(&self, query: &str) -> Result<Option<String>>;
}

/// Lookup over a plain HTTP search endpoint: `GET {endpoint}?q={query}`,
/// body text is the snippet.
pub struct HttpSearchLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSearchLookup {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build lookup HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl PriceLookup for HttpSearchLookup {
    async fn search(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .context("lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("lookup service returned {status}");
        }

        let body = response
            .text()
            .await
            .context("failed to read lookup response")?;
        let body = body.trim();

        Ok(if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        })
    }
}
