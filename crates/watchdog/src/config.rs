//! Watchdog configuration
//!
//! Settings come from an optional TOML file named by `WATCHDOG_CONFIG`
//! plus `WATCHDOG`-prefixed environment variables, with the environment
//! winning. Nested keys use a double underscore, so
//! `WATCHDOG__SERVICE__BASE_URL` sets `service.base_url`. Thresholds and
//! source URLs have no sane defaults; loading fails without them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use watchdog_lib::anomaly::{DedupConfig, ThresholdPolicy};
use watchdog_lib::notify::WebhookConfig;
use watchdog_lib::runner::RunnerConfig;
use watchdog_lib::source::SourceConfig;

/// Top-level watchdog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    /// API server port for health/metrics/state
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Name of the monitored deployment, shown in notification titles
    #[serde(default = "default_monitor_name")]
    pub monitor_name: String,

    /// Web service metrics API
    pub service: SourceSettings,

    /// LLM usage API
    pub llm: SourceSettings,

    /// Push notification endpoint
    pub webhook: WebhookSettings,

    /// Length of the observation window in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// How many hours back the baseline window ends
    #[serde(default = "default_baseline_hours_ago")]
    pub baseline_hours_ago: u32,

    /// Seconds between detection passes
    #[serde(default = "default_pass_interval")]
    pub pass_interval_secs: u64,

    /// Minutes an alert type stays silenced after a notification
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Minutes before recorded alert state expires
    #[serde(default = "default_state_ttl_minutes")]
    pub state_ttl_minutes: u64,

    /// HTTP timeout for sources and the webhook, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Alert state file; state is kept in memory when unset
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    /// Detection thresholds
    pub thresholds: ThresholdPolicy,
}

/// Connection settings for one metrics source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Push notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default)]
    pub topic: Option<String>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_monitor_name() -> String {
    "production".to_string()
}

fn default_window_minutes() -> u32 {
    15
}

fn default_baseline_hours_ago() -> u32 {
    24
}

fn default_pass_interval() -> u64 {
    300
}

fn default_cooldown_minutes() -> u64 {
    60
}

fn default_state_ttl_minutes() -> u64 {
    24 * 60
}

fn default_request_timeout() -> u64 {
    10
}

impl WatchdogConfig {
    /// Load configuration from the environment and an optional config file
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("WATCHDOG_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("WATCHDOG").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        let config: WatchdogConfig = settings
            .try_deserialize()
            .context("Invalid watchdog configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runner cannot operate on
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        anyhow::ensure!(self.window_minutes > 0, "window_minutes must be positive");
        anyhow::ensure!(
            self.pass_interval_secs > 0,
            "pass_interval_secs must be positive"
        );
        anyhow::ensure!(
            self.state_ttl_minutes > self.cooldown_minutes,
            "state_ttl_minutes ({}) must exceed cooldown_minutes ({})",
            self.state_ttl_minutes,
            self.cooldown_minutes
        );
        Ok(())
    }

    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            cooldown: Duration::from_secs(self.cooldown_minutes * 60),
            state_ttl: Duration::from_secs(self.state_ttl_minutes * 60),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            pass_interval: Duration::from_secs(self.pass_interval_secs),
            window_minutes: self.window_minutes,
            baseline_hours_ago: self.baseline_hours_ago,
        }
    }

    pub fn service_source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.service.base_url.clone(),
            api_key: self.service.api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn llm_source_config(&self) -> SourceConfig {
        SourceConfig {
            base_url: self.llm.base_url.clone(),
            api_key: self.llm.api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            url: self.webhook.url.clone(),
            topic: self.webhook.topic.clone(),
            monitor_name: self.monitor_name.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
