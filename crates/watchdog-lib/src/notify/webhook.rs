//! Push webhook notifier
//!
//! Posts one JSON notification per anomaly batch to an ntfy-compatible
//! endpoint. The whole batch becomes a single message so a noisy pass
//! produces one push, not six.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::anomaly::{Anomaly, Severity};

use super::{NotificationSender, NotifyError};

/// Settings for the push webhook
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint the notification JSON is posted to
    pub url: String,
    /// Optional channel routing hint carried in the payload
    pub topic: Option<String>,
    /// Name of the monitored deployment, shown in the notification title
    pub monitor_name: String,
    pub request_timeout: Duration,
}

/// Notification JSON posted to the webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub title: String,
    pub message: String,
    /// Push priority; `high` when any anomaly in the batch is high severity
    pub priority: Severity,
}

impl NotificationPayload {
    /// Build the payload for one nonempty batch
    pub fn from_anomalies(
        monitor_name: &str,
        topic: Option<String>,
        anomalies: &[Anomaly],
    ) -> Self {
        let priority = if anomalies.iter().any(|a| a.severity == Severity::High) {
            Severity::High
        } else {
            Severity::Default
        };

        let noun = if anomalies.len() == 1 {
            "anomaly"
        } else {
            "anomalies"
        };
        let title = format!("[{monitor_name}] {} {noun} detected", anomalies.len());

        let message = anomalies
            .iter()
            .map(|a| format!("[{}] {}", a.severity, a.message))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            topic,
            title,
            message,
            priority,
        }
    }
}

/// Sends notifications over HTTP POST
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
    topic: Option<String>,
    monitor_name: String,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let url = Url::parse(&config.url)
            .with_context(|| format!("Invalid webhook URL: {}", config.url))?;

        Ok(Self {
            client,
            url,
            topic: config.topic.clone(),
            monitor_name: config.monitor_name.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotifier {
    async fn send(&self, anomalies: &[Anomaly]) -> Result<(), NotifyError> {
        if anomalies.is_empty() {
            return Err(NotifyError::EmptyBatch);
        }

        let payload =
            NotificationPayload::from_anomalies(&self.monitor_name, self.topic.clone(), anomalies);

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        debug!(
            count = anomalies.len(),
            priority = %payload.priority,
            "Notification delivered"
        );
        Ok(())
    }
}
