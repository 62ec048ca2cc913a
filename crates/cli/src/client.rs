//! API client for communicating with the watchdog agent

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// API client for the watchdog agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request where 503 still carries a renderable body
    ///
    /// The health probes answer 503 with the same JSON document they
    /// answer 200 with, so an unhealthy agent is a result, not an error.
    pub async fn get_allow_unavailable<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a DELETE request, expecting an empty success response
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        Ok(())
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub components: HashMap<String, ComponentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStateEntry {
    pub anomaly_type: String,
    pub last_alert_time: String,
    pub alert_count: u32,
    pub in_cooldown: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStateList {
    pub states: Vec<AlertStateEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/alerts/state")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"states":[{"anomaly_type":"high_error_rate","last_alert_time":"2024-05-01T12:00:00Z","alert_count":3,"in_cooldown":true}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let list: AlertStateList = client.get("api/v1/alerts/state").await.unwrap();

        mock.assert_async().await;
        assert_eq!(list.states.len(), 1);
        assert_eq!(list.states[0].anomaly_type, "high_error_rate");
        assert_eq!(list.states[0].alert_count, 3);
        assert!(list.states[0].in_cooldown);
    }

    #[tokio::test]
    async fn test_get_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<HealthSummary> = client.get("healthz").await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("500"));
        assert!(err.contains("internal error"));
    }

    #[tokio::test]
    async fn test_get_allow_unavailable_parses_503_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"unhealthy","components":{}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health: HealthSummary = client.get_allow_unavailable("healthz").await.unwrap();

        assert_eq!(health.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_get_allow_unavailable_still_rejects_other_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let result: Result<HealthSummary> = client.get_allow_unavailable("healthz").await;

        assert!(result.unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/v1/alerts/state")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        client.delete("api/v1/alerts/state").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/v1/alerts/state")
            .with_status(503)
            .with_body("state store unavailable")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .delete("api/v1/alerts/state")
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("503"));
        assert!(err.contains("state store unavailable"));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
