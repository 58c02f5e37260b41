//! Remote summarization service client.
//!
//! The service is an opaque remote procedure: one JSON POST in, one JSON
//! body out. Network failures, non-2xx statuses, and malformed bodies are
//! all collapsed into a single transport failure.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, VidbriefError};
use crate::summary::RawSummary;

/// Seam between the orchestrator and the wire.
#[async_trait]
pub trait SummarizeBackend: Send + Sync {
    async fn summarize(&self, query: &str) -> Result<RawSummary>;
}

pub struct HttpSummarizer {
    endpoint: String,
    client: Client,
}

impl HttpSummarizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }
}

#[async_trait]
impl SummarizeBackend for HttpSummarizer {
    async fn summarize(&self, query: &str) -> Result<RawSummary> {
        let body = json!({
            "query": query,
            "tts": false
        });

        debug!("POST {} for \"{query}\"", self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("Cannot connect to {}", self.endpoint);
                } else if e.is_timeout() {
                    warn!("Summarization request timed out");
                }
                VidbriefError::Transport {
                    reason: e.to_string(),
                }
            })?;

        if !resp.status().is_success() {
            return Err(VidbriefError::Transport {
                reason: format!("service returned status {}", resp.status()),
            });
        }

        resp.json::<RawSummary>()
            .await
            .map_err(|e| VidbriefError::Transport {
                reason: format!("malformed response body: {e}"),
            })
    }
}
