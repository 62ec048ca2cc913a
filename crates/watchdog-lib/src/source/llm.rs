//! LLM service usage source
//!
//! Reads aggregated call metrics and token usage from the LLM service's
//! `/api/v1/usage/summary` endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::models::LlmSnapshot;

use super::{build_http_client, get_json, SnapshotSource, SourceConfig, SourceError};

const USAGE_PATH: &str = "api/v1/usage/summary";

/// HTTP client for the LLM service usage API
pub struct HttpLlmSource {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

/// Wire format of the usage endpoint
#[derive(Debug, Deserialize)]
struct UsageSummary {
    window_end: DateTime<Utc>,
    call_count: u64,
    error_rate_percent: f64,
    latency_p95_ms: f64,
    total_tokens: u64,
}

impl UsageSummary {
    fn into_snapshot(self, window_minutes: u32) -> LlmSnapshot {
        LlmSnapshot {
            timestamp: self.window_end,
            window_minutes,
            call_count: self.call_count,
            error_rate_percent: self.error_rate_percent,
            latency_p95_ms: self.latency_p95_ms,
            total_tokens: self.total_tokens,
        }
    }
}

impl HttpLlmSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = build_http_client(config.request_timeout)?;
        let endpoint = Url::parse(&config.base_url)
            .and_then(|base| base.join(USAGE_PATH))
            .with_context(|| format!("Invalid LLM usage URL: {}", config.base_url))?;

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
    ) -> Result<Option<LlmSnapshot>, SourceError> {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("window_minutes", &window_minutes.to_string());
            if let Some(hours) = ending_hours_ago {
                query.append_pair("ending_hours_ago", &hours.to_string());
            }
        }

        let summary: Option<UsageSummary> =
            get_json(&self.client, url, self.api_key.as_deref()).await?;
        Ok(summary.map(|summary| summary.into_snapshot(window_minutes)))
    }
}

#[async_trait]
impl SnapshotSource for HttpLlmSource {
    type Snapshot = LlmSnapshot;

    async fn current(&self, window_minutes: u32) -> Result<Option<LlmSnapshot>, SourceError> {
        self.fetch(window_minutes, None).await
    }

    async fn baseline(
        &self,
        window_minutes: u32,
        hours_ago: u32,
    ) -> Result<Option<LlmSnapshot>, SourceError> {
        self.fetch(window_minutes, Some(hours_ago)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;

    fn source_for(server: &mockito::ServerGuard) -> HttpLlmSource {
        HttpLlmSource::new(&SourceConfig {
            base_url: server.url(),
            api_key: None,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_current_parses_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/usage/summary")
            .match_query(Matcher::UrlEncoded(
                "window_minutes".into(),
                "15".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "window_end": "2024-05-01T12:00:00Z",
                    "call_count": 320,
                    "error_rate_percent": 2.5,
                    "latency_p95_ms": 4100.0,
                    "total_tokens": 185000
                }"#,
            )
            .create_async()
            .await;

        let snapshot = source_for(&server).current(15).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.call_count, 320);
        assert_eq!(snapshot.error_rate_percent, 2.5);
        assert_eq!(snapshot.latency_p95_ms, 4100.0);
        assert_eq!(snapshot.total_tokens, 185_000);
    }

    #[tokio::test]
    async fn test_baseline_requests_offset_window() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/usage/summary")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("window_minutes".into(), "15".into()),
                Matcher::UrlEncoded("ending_hours_ago".into(), "24".into()),
            ]))
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let snapshot = source_for(&server).baseline(15, 24).await.unwrap();

        mock.assert_async().await;
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_not_found_means_no_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/usage/summary")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let snapshot = source_for(&server).current(15).await.unwrap();
        assert!(snapshot.is_none());
    }
}
