//! Threshold policy for anomaly detection
//!
//! Every limit is explicit. There are no built-in defaults: a missing
//! threshold is a configuration error, not an implied "never alert".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete set of detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub service: ServiceThresholds,
    pub llm: LlmThresholds,
}

/// Limits applied to web service snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceThresholds {
    /// Error rate above this percentage is anomalous
    pub error_rate_percent: f64,
    /// P95 latency above this many milliseconds is anomalous
    pub latency_p95_ms: f64,
    /// P99 latency above this many milliseconds is anomalous
    pub latency_p99_ms: f64,
    /// Request volume above baseline times this multiplier is anomalous
    pub traffic_spike_multiplier: f64,
}

/// Limits applied to LLM service snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmThresholds {
    /// Call error rate above this percentage is anomalous
    pub error_rate_percent: f64,
    /// P95 call latency above this many milliseconds is anomalous
    pub latency_p95_ms: f64,
    /// Token usage above baseline times this multiplier is anomalous
    pub token_spike_multiplier: f64,
}

impl ThresholdPolicy {
    /// Check that every limit is usable for comparison
    pub fn validate(&self) -> Result<()> {
        self.service.validate().context("service thresholds")?;
        self.llm.validate().context("llm thresholds")?;
        Ok(())
    }
}

impl ServiceThresholds {
    fn validate(&self) -> Result<()> {
        ensure_limit("error_rate_percent", self.error_rate_percent)?;
        ensure_limit("latency_p95_ms", self.latency_p95_ms)?;
        ensure_limit("latency_p99_ms", self.latency_p99_ms)?;
        ensure_multiplier("traffic_spike_multiplier", self.traffic_spike_multiplier)?;
        Ok(())
    }
}

impl LlmThresholds {
    fn validate(&self) -> Result<()> {
        ensure_limit("error_rate_percent", self.error_rate_percent)?;
        ensure_limit("latency_p95_ms", self.latency_p95_ms)?;
        ensure_multiplier("token_spike_multiplier", self.token_spike_multiplier)?;
        Ok(())
    }
}

fn ensure_limit(name: &str, value: f64) -> Result<()> {
    anyhow::ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite non-negative number, got {value}"
    );
    Ok(())
}

fn ensure_multiplier(name: &str, value: f64) -> Result<()> {
    anyhow::ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a finite positive number, got {value}"
    );
    Ok(())
}
