//! Anomaly detection and alert deduplication
//!
//! This module provides:
//! - Threshold policies for the web service and LLM service metrics
//! - A pure detector that turns metric snapshots into anomalies
//! - Cooldown-based deduplication backed by the alert state store

mod dedup;
mod detector;
mod event;
mod policy;

pub use dedup::{AlertDeduper, DedupConfig};
pub use detector::AnomalyDetector;
pub use event::{Anomaly, AnomalyType, Severity};
pub use policy::{LlmThresholds, ServiceThresholds, ThresholdPolicy};
