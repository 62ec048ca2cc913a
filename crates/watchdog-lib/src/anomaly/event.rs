//! Anomaly event types shared across detection, deduplication and delivery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anomaly classification
///
/// The variant set is closed: deduplication state is keyed by these values,
/// so adding a variant is a state-schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    HighErrorRate,
    HighLatency,
    TrafficSpike,
    LlmErrorRate,
    LlmLatency,
    LlmHighTokens,
}

impl AnomalyType {
    /// Every known anomaly type, in stable emission order
    pub const ALL: [AnomalyType; 6] = [
        AnomalyType::HighErrorRate,
        AnomalyType::HighLatency,
        AnomalyType::TrafficSpike,
        AnomalyType::LlmErrorRate,
        AnomalyType::LlmLatency,
        AnomalyType::LlmHighTokens,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::HighErrorRate => "high_error_rate",
            AnomalyType::HighLatency => "high_latency",
            AnomalyType::TrafficSpike => "traffic_spike",
            AnomalyType::LlmErrorRate => "llm_error_rate",
            AnomalyType::LlmLatency => "llm_latency",
            AnomalyType::LlmHighTokens => "llm_high_tokens",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity levels
///
/// The values double as push notification priorities, so the serialized
/// form is part of the delivery contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Default,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Default => write!(f, "default"),
        }
    }
}

/// A single detected anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    /// Human-readable description carrying the observed value and threshold
    pub message: String,
    pub observed_value: f64,
    pub threshold: f64,
    /// Timestamp of the metric window that triggered the anomaly
    pub occurred_at: DateTime<Utc>,
}
