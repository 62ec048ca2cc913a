//! Detection pass scheduling and orchestration
//!
//! The runner drives one detection pass at a time: fetch snapshots from
//! both sources, detect anomalies, filter them through the deduper, send
//! one notification, then record what was sent. A pass never returns an
//! error; failures are contained to the narrowest scope that stays
//! correct. A failed source skips only its own checks, a failed store
//! withholds notifications, and a failed delivery leaves state untouched
//! so the alerts retry next pass.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::anomaly::{AlertDeduper, AnomalyDetector};
use crate::health::{components, HealthRegistry};
use crate::notify::NotificationSender;
use crate::observability::WatchdogMetrics;
use crate::source::{LlmSourceHandle, ServiceSourceHandle, SourceError};

/// Default pass interval (5 minutes)
const DEFAULT_PASS_INTERVAL_SECS: u64 = 5 * 60;

/// Default observation window (15 minutes)
const DEFAULT_WINDOW_MINUTES: u32 = 15;

/// Default baseline offset (same window yesterday)
const DEFAULT_BASELINE_HOURS_AGO: u32 = 24;

/// Configuration for the detection loop
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Time between detection passes
    pub pass_interval: Duration,
    /// Length of the observation window requested from sources
    pub window_minutes: u32,
    /// How far back the baseline window ends
    pub baseline_hours_ago: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_secs(DEFAULT_PASS_INTERVAL_SECS),
            window_minutes: DEFAULT_WINDOW_MINUTES,
            baseline_hours_ago: DEFAULT_BASELINE_HOURS_AGO,
        }
    }
}

/// What one detection pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Anomalies found across both sources
    pub detected: usize,
    /// Anomalies dropped by the cooldown filter
    pub suppressed: usize,
    /// Anomalies delivered in the notification
    pub notified: usize,
    /// Source fetches that failed
    pub source_errors: usize,
    /// The alert state store failed during this pass
    pub store_failed: bool,
    /// The notification could not be delivered
    pub delivery_failed: bool,
}

/// Periodic anomaly monitor over both metric sources
pub struct MonitorRunner {
    /// Web service metrics source
    service_source: ServiceSourceHandle,
    /// LLM service usage source
    llm_source: LlmSourceHandle,
    /// Pure threshold detector
    detector: AnomalyDetector,
    /// Cooldown filter over the alert state store
    deduper: AlertDeduper,
    /// Notification channel
    notifier: Arc<dyn NotificationSender>,
    /// Component health registry
    health: HealthRegistry,
    /// Prometheus metrics handle
    metrics: WatchdogMetrics,
    /// Configuration
    config: RunnerConfig,
}

impl MonitorRunner {
    /// Run detection passes until shutdown is signalled
    ///
    /// The first pass runs immediately; later passes follow the configured
    /// interval. Only one pass is ever in flight.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.pass_interval.as_secs(),
            window_minutes = self.config.window_minutes,
            baseline_hours_ago = self.config.baseline_hours_ago,
            "Starting detection loop"
        );

        let mut ticker = interval(self.config.pass_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down detection loop");
                    break;
                }
            }
        }
    }

    /// Execute one detection pass
    ///
    /// Never returns an error: every failure is logged, counted, and
    /// reflected in the summary instead.
    pub async fn run_pass(&self) -> PassSummary {
        let started = Instant::now();
        let summary = self.execute_pass().await;

        self.metrics.inc_passes();
        self.metrics
            .observe_pass_duration(started.elapsed().as_secs_f64());

        info!(
            detected = summary.detected,
            suppressed = summary.suppressed,
            notified = summary.notified,
            source_errors = summary.source_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detection pass complete"
        );
        summary
    }

    async fn execute_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();
        let window = self.config.window_minutes;
        let hours_ago = self.config.baseline_hours_ago;

        let (service_current, service_baseline, llm_current, llm_baseline) = tokio::join!(
            self.service_source.current(window),
            self.service_source.baseline(window, hours_ago),
            self.llm_source.current(window),
            self.llm_source.baseline(window, hours_ago),
        );

        let mut anomalies = Vec::new();

        if let Some(current) = self
            .accept_current(
                service_current,
                "service",
                components::SERVICE_SOURCE,
                &mut summary,
            )
            .await
        {
            let baseline = self.accept_baseline(service_baseline, "service", &mut summary);
            anomalies.extend(self.detector.detect_service(&current, baseline.as_ref()));
        }

        if let Some(current) = self
            .accept_current(llm_current, "llm", components::LLM_SOURCE, &mut summary)
            .await
        {
            let baseline = self.accept_baseline(llm_baseline, "llm", &mut summary);
            anomalies.extend(self.detector.detect_llm(&current, baseline.as_ref()));
        }

        summary.detected = anomalies.len();
        for anomaly in &anomalies {
            self.metrics.inc_anomalies(anomaly.anomaly_type.as_str());
            debug!(
                anomaly_type = %anomaly.anomaly_type,
                severity = %anomaly.severity,
                observed = anomaly.observed_value,
                threshold = anomaly.threshold,
                "Anomaly detected"
            );
        }

        if anomalies.is_empty() {
            return summary;
        }

        // Store outage fails closed: without cooldown state, notifying
        // could spam every pass.
        let eligible = match self.deduper.filter_new_alerts(&anomalies).await {
            Ok(eligible) => {
                self.health.set_healthy(components::STATE_STORE).await;
                eligible
            }
            Err(e) => {
                error!(error = %e, "Alert state unavailable; withholding notifications this pass");
                self.metrics.inc_store_errors();
                self.health
                    .set_unhealthy(components::STATE_STORE, e.to_string())
                    .await;
                summary.store_failed = true;
                return summary;
            }
        };

        summary.suppressed = summary.detected - eligible.len();
        self.metrics.add_suppressed(summary.suppressed as u64);

        if eligible.is_empty() {
            debug!(detected = summary.detected, "All anomalies inside cooldown");
            return summary;
        }

        match self.notifier.send(&eligible).await {
            Ok(()) => {
                self.health.set_healthy(components::NOTIFIER).await;
                self.metrics.add_notified(eligible.len() as u64);
                summary.notified = eligible.len();
            }
            Err(e) => {
                error!(
                    error = %e,
                    count = eligible.len(),
                    "Notification delivery failed; alerts stay eligible next pass"
                );
                self.metrics.inc_delivery_errors();
                self.health
                    .set_degraded(components::NOTIFIER, e.to_string())
                    .await;
                summary.delivery_failed = true;
                return summary;
            }
        }

        if let Err(e) = self.deduper.record_alerts(&eligible).await {
            error!(error = %e, "Failed to record alert state; duplicates possible next pass");
            self.metrics.inc_store_errors();
            self.health
                .set_degraded(components::STATE_STORE, e.to_string())
                .await;
            summary.store_failed = true;
        }

        summary
    }

    async fn accept_current<S>(
        &self,
        result: Result<Option<S>, SourceError>,
        source: &str,
        component: &str,
        summary: &mut PassSummary,
    ) -> Option<S> {
        match result {
            Ok(Some(snapshot)) => {
                self.health.set_healthy(component).await;
                Some(snapshot)
            }
            Ok(None) => {
                self.health.set_healthy(component).await;
                debug!(source, "No metric data for the current window");
                None
            }
            Err(e) => {
                warn!(source, error = %e, "Metric fetch failed; skipping source this pass");
                self.metrics.inc_source_errors(source);
                self.health.set_degraded(component, e.to_string()).await;
                summary.source_errors += 1;
                None
            }
        }
    }

    fn accept_baseline<S>(
        &self,
        result: Result<Option<S>, SourceError>,
        source: &str,
        summary: &mut PassSummary,
    ) -> Option<S> {
        match result {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!(source, error = %e, "Baseline fetch failed; spike checks skipped this pass");
                self.metrics.inc_source_errors(source);
                summary.source_errors += 1;
                None
            }
        }
    }
}

/// Builder for the monitor runner
pub struct MonitorRunnerBuilder {
    service_source: Option<ServiceSourceHandle>,
    llm_source: Option<LlmSourceHandle>,
    detector: Option<AnomalyDetector>,
    deduper: Option<AlertDeduper>,
    notifier: Option<Arc<dyn NotificationSender>>,
    health: HealthRegistry,
    metrics: Option<WatchdogMetrics>,
    config: RunnerConfig,
}

impl MonitorRunnerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            service_source: None,
            llm_source: None,
            detector: None,
            deduper: None,
            notifier: None,
            health: HealthRegistry::new(),
            metrics: None,
            config: RunnerConfig::default(),
        }
    }

    /// Set the web service metrics source
    pub fn service_source(mut self, source: ServiceSourceHandle) -> Self {
        self.service_source = Some(source);
        self
    }

    /// Set the LLM usage source
    pub fn llm_source(mut self, source: LlmSourceHandle) -> Self {
        self.llm_source = Some(source);
        self
    }

    /// Set the anomaly detector
    pub fn detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Set the alert deduper
    pub fn deduper(mut self, deduper: AlertDeduper) -> Self {
        self.deduper = Some(deduper);
        self
    }

    /// Set the notification sender
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the health registry shared with the API server
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Set the metrics handle
    pub fn metrics(mut self, metrics: WatchdogMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the pass interval
    pub fn pass_interval(mut self, interval: Duration) -> Self {
        self.config.pass_interval = interval;
        self
    }

    /// Set the observation window length
    pub fn window_minutes(mut self, minutes: u32) -> Self {
        self.config.window_minutes = minutes;
        self
    }

    /// Set the baseline offset
    pub fn baseline_hours_ago(mut self, hours: u32) -> Self {
        self.config.baseline_hours_ago = hours;
        self
    }

    /// Build the runner
    pub fn build(self) -> Result<MonitorRunner> {
        let service_source = self
            .service_source
            .ok_or_else(|| anyhow::anyhow!("Service source is required"))?;
        let llm_source = self
            .llm_source
            .ok_or_else(|| anyhow::anyhow!("LLM source is required"))?;
        let detector = self
            .detector
            .ok_or_else(|| anyhow::anyhow!("Detector is required"))?;
        let deduper = self
            .deduper
            .ok_or_else(|| anyhow::anyhow!("Deduper is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("Notifier is required"))?;

        Ok(MonitorRunner {
            service_source,
            llm_source,
            detector,
            deduper,
            notifier,
            health: self.health,
            metrics: self.metrics.unwrap_or_default(),
            config: self.config,
        })
    }
}

impl Default for MonitorRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
