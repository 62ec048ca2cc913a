//! Metrics Watchdog - anomaly detection and alerting agent
//!
//! This binary polls a web service metrics API and an LLM usage API on a
//! fixed interval, compares snapshots against configured thresholds, and
//! pushes deduplicated alerts to an ntfy-compatible webhook.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watchdog_lib::{
    anomaly::{AlertDeduper, AnomalyDetector},
    clock::SystemClock,
    health::{components, HealthRegistry},
    notify::WebhookNotifier,
    observability::WatchdogMetrics,
    runner::MonitorRunnerBuilder,
    source::{HttpLlmSource, HttpServiceSource},
    store::{AlertStateStore, FileStateStore, MemoryStateStore},
};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting metrics-watchdog");

    // Load configuration
    let config = config::WatchdogConfig::load()?;
    info!(
        monitor_name = %config.monitor_name,
        window_minutes = config.window_minutes,
        pass_interval_secs = config.pass_interval_secs,
        "Watchdog configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SERVICE_SOURCE).await;
    health_registry.register(components::LLM_SOURCE).await;
    health_registry.register(components::STATE_STORE).await;
    health_registry.register(components::NOTIFIER).await;

    // Initialize metrics
    let metrics = WatchdogMetrics::new();

    // Alert state survives restarts when a state file is configured
    let clock = Arc::new(SystemClock);
    let store: Arc<dyn AlertStateStore> = match &config.state_path {
        Some(path) => {
            info!(path = %path.display(), "Using file-backed alert state");
            Arc::new(FileStateStore::open(path.clone(), clock.clone()).await?)
        }
        None => {
            info!("Using in-memory alert state");
            Arc::new(MemoryStateStore::new(clock.clone()))
        }
    };

    let deduper = AlertDeduper::new(store, clock, config.dedup_config())?;

    // Wire up sources, detector, and notifier
    let service_source = Arc::new(HttpServiceSource::new(&config.service_source_config())?);
    let llm_source = Arc::new(HttpLlmSource::new(&config.llm_source_config())?);
    let notifier = Arc::new(WebhookNotifier::new(&config.webhook_config())?);

    let runner = MonitorRunnerBuilder::new()
        .service_source(service_source)
        .llm_source(llm_source)
        .detector(AnomalyDetector::new(config.thresholds.clone()))
        .deduper(deduper.clone())
        .notifier(notifier)
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .pass_interval(config.runner_config().pass_interval)
        .window_minutes(config.window_minutes)
        .baseline_hours_ago(config.baseline_hours_ago)
        .build()?;

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        deduper,
    ));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    // Start health and metrics server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Start the detection loop
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner_handle = tokio::spawn(Arc::new(runner).run(shutdown_rx));

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    let _ = runner_handle.await;
    api_handle.abort();

    Ok(())
}
