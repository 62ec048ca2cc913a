//! Core data models for the metrics watchdog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated web service metrics for one observation window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// End of the window the aggregates cover
    pub timestamp: DateTime<Utc>,
    pub window_minutes: u32,
    pub request_count: u64,
    pub error_rate_percent: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
}

/// Aggregated LLM service usage for one observation window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSnapshot {
    /// End of the window the aggregates cover
    pub timestamp: DateTime<Utc>,
    pub window_minutes: u32,
    pub call_count: u64,
    pub error_rate_percent: f64,
    pub latency_p95_ms: f64,
    pub total_tokens: u64,
}

/// Per-anomaly-type alert bookkeeping kept in the state store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertState {
    /// When a notification for this anomaly type was last delivered
    pub last_alert_time: DateTime<Utc>,
    /// How many notifications have been delivered inside the current TTL
    pub alert_count: u32,
}
