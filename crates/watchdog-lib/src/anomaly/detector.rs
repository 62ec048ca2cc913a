//! Threshold-based anomaly detection
//!
//! The detector compares metric snapshots against a fixed policy and emits
//! anomalies. It performs no I/O and keeps no state between calls, so the
//! same inputs always produce the same output.

use crate::models::{LlmSnapshot, ServiceSnapshot};

use super::event::{Anomaly, AnomalyType, Severity};
use super::policy::ThresholdPolicy;

/// Turns metric snapshots into anomalies according to a threshold policy
pub struct AnomalyDetector {
    policy: ThresholdPolicy,
}

impl AnomalyDetector {
    /// Create a detector for the given policy
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// Evaluate a web service snapshot
    ///
    /// Emission order is fixed: error rate, P95 latency, P99 latency, then
    /// traffic spike. A window with zero requests carries no signal for
    /// rate checks, so the error rate check is skipped rather than scored
    /// as a pass. The spike check needs a baseline with nonzero traffic;
    /// without one it is skipped.
    pub fn detect_service(
        &self,
        current: &ServiceSnapshot,
        baseline: Option<&ServiceSnapshot>,
    ) -> Vec<Anomaly> {
        let limits = &self.policy.service;
        let mut anomalies = Vec::new();

        if current.request_count > 0 && current.error_rate_percent > limits.error_rate_percent {
            anomalies.push(Anomaly {
                anomaly_type: AnomalyType::HighErrorRate,
                severity: Severity::High,
                message: format!(
                    "Error rate {:.2}% exceeds threshold {:.2}%",
                    current.error_rate_percent, limits.error_rate_percent
                ),
                observed_value: current.error_rate_percent,
                threshold: limits.error_rate_percent,
                occurred_at: current.timestamp,
            });
        }

        if current.latency_p95_ms > limits.latency_p95_ms {
            anomalies.push(Anomaly {
                anomaly_type: AnomalyType::HighLatency,
                severity: Severity::Default,
                message: format!(
                    "P95 latency {:.0} ms exceeds threshold {:.0} ms",
                    current.latency_p95_ms, limits.latency_p95_ms
                ),
                observed_value: current.latency_p95_ms,
                threshold: limits.latency_p95_ms,
                occurred_at: current.timestamp,
            });
        }

        if current.latency_p99_ms > limits.latency_p99_ms {
            anomalies.push(Anomaly {
                anomaly_type: AnomalyType::HighLatency,
                severity: Severity::Default,
                message: format!(
                    "P99 latency {:.0} ms exceeds threshold {:.0} ms",
                    current.latency_p99_ms, limits.latency_p99_ms
                ),
                observed_value: current.latency_p99_ms,
                threshold: limits.latency_p99_ms,
                occurred_at: current.timestamp,
            });
        }

        if let Some(baseline) = baseline {
            // A zero-traffic baseline cannot anchor a ratio.
            if baseline.request_count > 0 {
                let ratio = current.request_count as f64 / baseline.request_count as f64;
                if ratio > limits.traffic_spike_multiplier {
                    anomalies.push(Anomaly {
                        anomaly_type: AnomalyType::TrafficSpike,
                        severity: Severity::Default,
                        message: format!(
                            "Request volume {:.2}x baseline exceeds {:.2}x multiplier",
                            ratio, limits.traffic_spike_multiplier
                        ),
                        observed_value: ratio,
                        threshold: limits.traffic_spike_multiplier,
                        occurred_at: current.timestamp,
                    });
                }
            }
        }

        anomalies
    }

    /// Evaluate an LLM service snapshot
    ///
    /// Emission order is fixed: error rate, latency, then token spike.
    /// Zero-call windows and zero-token baselines skip the respective
    /// ratio checks, mirroring `detect_service`.
    pub fn detect_llm(&self, current: &LlmSnapshot, baseline: Option<&LlmSnapshot>) -> Vec<Anomaly> {
        let limits = &self.policy.llm;
        let mut anomalies = Vec::new();

        if current.call_count > 0 && current.error_rate_percent > limits.error_rate_percent {
            anomalies.push(Anomaly {
                anomaly_type: AnomalyType::LlmErrorRate,
                severity: Severity::High,
                message: format!(
                    "LLM error rate {:.2}% exceeds threshold {:.2}%",
                    current.error_rate_percent, limits.error_rate_percent
                ),
                observed_value: current.error_rate_percent,
                threshold: limits.error_rate_percent,
                occurred_at: current.timestamp,
            });
        }

        if current.latency_p95_ms > limits.latency_p95_ms {
            anomalies.push(Anomaly {
                anomaly_type: AnomalyType::LlmLatency,
                severity: Severity::Default,
                message: format!(
                    "LLM P95 latency {:.0} ms exceeds threshold {:.0} ms",
                    current.latency_p95_ms, limits.latency_p95_ms
                ),
                observed_value: current.latency_p95_ms,
                threshold: limits.latency_p95_ms,
                occurred_at: current.timestamp,
            });
        }

        if let Some(baseline) = baseline {
            if baseline.total_tokens > 0 {
                let ratio = current.total_tokens as f64 / baseline.total_tokens as f64;
                if ratio > limits.token_spike_multiplier {
                    anomalies.push(Anomaly {
                        anomaly_type: AnomalyType::LlmHighTokens,
                        severity: Severity::Default,
                        message: format!(
                            "Token usage {:.2}x baseline exceeds {:.2}x multiplier",
                            ratio, limits.token_spike_multiplier
                        ),
                        observed_value: ratio,
                        threshold: limits.token_spike_multiplier,
                        occurred_at: current.timestamp,
                    });
                }
            }
        }

        anomalies
    }
}
