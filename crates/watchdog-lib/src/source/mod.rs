//! Metric snapshot sources
//!
//! Sources fetch aggregated metrics over HTTP. They are read-only: a
//! source either yields a snapshot, yields nothing (the window holds no
//! data), or fails with a [`SourceError`]. The runner decides what a
//! failure means for the pass.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::{LlmSnapshot, ServiceSnapshot};

mod llm;
mod service;

pub use llm::HttpLlmSource;
pub use service::HttpServiceSource;

/// Errors surfaced by snapshot sources
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a usable response
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The source answered with a non-success status
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// The response body did not match the expected shape
    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Provider of current and baseline metric snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    type Snapshot;

    /// Snapshot for the most recent window of `window_minutes`
    async fn current(&self, window_minutes: u32) -> Result<Option<Self::Snapshot>, SourceError>;

    /// Snapshot for the same window length ending `hours_ago` hours in the past
    async fn baseline(
        &self,
        window_minutes: u32,
        hours_ago: u32,
    ) -> Result<Option<Self::Snapshot>, SourceError>;
}

/// Shared handle types for injecting sources into the runner
pub type ServiceSourceHandle = Arc<dyn SnapshotSource<Snapshot = ServiceSnapshot>>;
pub type LlmSourceHandle = Arc<dyn SnapshotSource<Snapshot = LlmSnapshot>>;

/// Connection settings for one HTTP source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the metrics API
    pub base_url: String,
    /// Bearer token sent as `Authorization` when set
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// GET a JSON document, mapping "no data" responses to `None`
///
/// 204 and 404 mean the source has nothing for the requested window, as
/// does a 200 with an empty or `null` body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: Url,
    api_key: Option<&str>,
) -> Result<Option<T>, SourceError> {
    let mut request = client.get(url);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status { status, body });
    }

    let body = response.text().await?;
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| SourceError::Decode(e.to_string()))
}
