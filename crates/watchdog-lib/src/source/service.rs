//! Web service metrics source
//!
//! Reads aggregated request metrics from the service's
//! `/api/v1/metrics/summary` endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::models::ServiceSnapshot;

use super::{build_http_client, get_json, SnapshotSource, SourceConfig, SourceError};

const SUMMARY_PATH: &str = "api/v1/metrics/summary";

/// HTTP client for the web service metrics API
pub struct HttpServiceSource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

/// Wire format of the summary endpoint
#[derive(Debug, Deserialize)]
struct ServiceSummary {
    window_end: DateTime<Utc>,
    request_count: u64,
    error_rate_percent: f64,
    latency_p95_ms: f64,
    latency_p99_ms: f64,
}

impl ServiceSummary {
    fn into_snapshot(self, window_minutes: u32) -> ServiceSnapshot {
        ServiceSnapshot {
            timestamp: self.window_end,
            window_minutes,
            request_count: self.request_count,
            error_rate_percent: self.error_rate_percent,
            latency_p95_ms: self.latency_p95_ms,
            latency_p99_ms: self.latency_p99_ms,
        }
    }
}

impl HttpServiceSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = build_http_client(config.request_timeout)?;
        let endpoint = Url::parse(&config.base_url)
            .and_then(|base| base.join(SUMMARY_PATH))
            .with_context(|| format!("Invalid service metrics URL: {}", config.base_url))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    async fn fetch(
        &self,
        window_minutes: u32,
        ending_hours_ago: Option<u32>,
    ) -> Result<Option<ServiceSnapshot>, SourceError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("window_minutes", &window_minutes.to_string());
            if let Some(hours) = ending_hours_ago {
                query.append_pair("ending_hours_ago", &hours.to_string());
            }
        }

        let summary: Option<ServiceSummary> =
            get_json(&self.client, url, self.api_key.as_deref()).await?;
        Ok(summary.map(|summary| summary.into_snapshot(window_minutes)))
    }
}

#[async_trait]
impl SnapshotSource for HttpServiceSource {
    type Snapshot = ServiceSnapshot;

    async fn current(&self, window_minutes: u32) -> Result<Option<ServiceSnapshot>, SourceError> {
        self.fetch(window_minutes, None).await
    }

    async fn baseline(
        &self,
        window_minutes: u32,
        hours_ago: u32,
    ) -> Result<Option<ServiceSnapshot>, SourceError> {
        self.fetch(window_minutes, Some(hours_ago)).await
    }
}
