//! Core library for the metrics watchdog agent
//!
//! This crate provides the core functionality for:
//! - Fetching metric snapshots from the web service and LLM service APIs
//! - Threshold-based anomaly detection
//! - Alert deduplication backed by a TTL'd state store
//! - Push notification delivery
//! - Health checks and observability

pub mod anomaly;
pub mod clock;
pub mod health;
pub mod models;
pub mod notify;
pub mod observability;
pub mod runner;
pub mod source;
pub mod store;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::WatchdogMetrics;
