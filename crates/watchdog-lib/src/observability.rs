//! Observability infrastructure for the watchdog agent
//!
//! Provides Prometheus metrics for detection passes: pass duration,
//! anomaly counts per type, notification and suppression counts, and
//! error counters per failure domain.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Histogram buckets for pass duration (in seconds); passes make a handful
/// of HTTP calls, so the range is wide
const PASS_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WatchdogMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct WatchdogMetricsInner {
    pass_duration_seconds: Histogram,
    passes_total: IntCounter,
    anomalies_detected_total: IntCounterVec,
    alerts_notified_total: IntCounter,
    alerts_suppressed_total: IntCounter,
    source_errors_total: IntCounterVec,
    store_errors_total: IntCounter,
    delivery_errors_total: IntCounter,
}

impl WatchdogMetricsInner {
    fn new() -> Self {
        Self {
            pass_duration_seconds: register_histogram!(
                "watchdog_pass_duration_seconds",
                "Time spent running one detection pass end to end",
                PASS_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_duration_seconds"),

            passes_total: register_int_counter!(
                "watchdog_passes_total",
                "Total number of detection passes run"
            )
            .expect("Failed to register passes_total"),

            anomalies_detected_total: register_int_counter_vec!(
                "watchdog_anomalies_detected_total",
                "Total number of anomalies detected, per anomaly type",
                &["anomaly_type"]
            )
            .expect("Failed to register anomalies_detected_total"),

            alerts_notified_total: register_int_counter!(
                "watchdog_alerts_notified_total",
                "Total number of anomalies delivered as notifications"
            )
            .expect("Failed to register alerts_notified_total"),

            alerts_suppressed_total: register_int_counter!(
                "watchdog_alerts_suppressed_total",
                "Total number of anomalies suppressed by the cooldown"
            )
            .expect("Failed to register alerts_suppressed_total"),

            source_errors_total: register_int_counter_vec!(
                "watchdog_source_errors_total",
                "Total number of metric source failures, per source",
                &["source"]
            )
            .expect("Failed to register source_errors_total"),

            store_errors_total: register_int_counter!(
                "watchdog_store_errors_total",
                "Total number of alert state store failures"
            )
            .expect("Failed to register store_errors_total"),

            delivery_errors_total: register_int_counter!(
                "watchdog_delivery_errors_total",
                "Total number of failed notification deliveries"
            )
            .expect("Failed to register delivery_errors_total"),
        }
    }
}

/// Watchdog metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct WatchdogMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for WatchdogMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WatchdogMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WatchdogMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long a detection pass took
    pub fn observe_pass_duration(&self, duration_secs: f64) {
        self.inner().pass_duration_seconds.observe(duration_secs);
    }

    /// Count a completed detection pass
    pub fn inc_passes(&self) {
        self.inner().passes_total.inc();
    }

    /// Count one detected anomaly of the given type
    pub fn inc_anomalies(&self, anomaly_type: &str) {
        self.inner()
            .anomalies_detected_total
            .with_label_values(&[anomaly_type])
            .inc();
    }

    /// Count anomalies delivered in a notification
    pub fn add_notified(&self, count: u64) {
        self.inner().alerts_notified_total.inc_by(count);
    }

    /// Count anomalies suppressed by the cooldown
    pub fn add_suppressed(&self, count: u64) {
        self.inner().alerts_suppressed_total.inc_by(count);
    }

    /// Count a metric source failure
    pub fn inc_source_errors(&self, source: &str) {
        self.inner()
            .source_errors_total
            .with_label_values(&[source])
            .inc();
    }

    /// Count an alert state store failure
    pub fn inc_store_errors(&self) {
        self.inner().store_errors_total.inc();
    }

    /// Count a failed notification delivery
    pub fn inc_delivery_errors(&self) {
        self.inner().delivery_errors_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_metrics_creation() {
        // Note: This test may fail if run multiple times in the same process
        // due to Prometheus global registry. In practice, metrics are created once.
        let metrics = WatchdogMetrics::new();

        metrics.observe_pass_duration(0.25);
        metrics.inc_passes();
        metrics.inc_anomalies("high_error_rate");
        metrics.add_notified(2);
        metrics.add_suppressed(1);
        metrics.inc_source_errors("service");
        metrics.inc_store_errors();
        metrics.inc_delivery_errors();
    }

    #[test]
    fn test_metrics_handle_is_shared() {
        let first = WatchdogMetrics::new();
        let second = WatchdogMetrics::new();

        first.inc_anomalies("traffic_spike");
        second.inc_anomalies("traffic_spike");

        let count = second
            .inner()
            .anomalies_detected_total
            .with_label_values(&["traffic_spike"])
            .get();
        assert!(count >= 2);
    }
}
