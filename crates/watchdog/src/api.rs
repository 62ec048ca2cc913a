//! HTTP API for health checks, Prometheus metrics, and alert state
//!
//! Alert state endpoints exist for operators: list what is currently in
//! cooldown, and clear state to force the next pass to re-alert.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use watchdog_lib::{
    anomaly::AlertDeduper,
    health::{ComponentStatus, HealthRegistry},
    observability::WatchdogMetrics,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: WatchdogMetrics,
    pub deduper: AlertDeduper,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: WatchdogMetrics,
        deduper: AlertDeduper,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            deduper,
        }
    }
}

/// One alert type's recorded state
#[derive(Debug, Serialize)]
pub struct AlertStateEntry {
    pub anomaly_type: String,
    pub last_alert_time: DateTime<Utc>,
    pub alert_count: u32,
    pub in_cooldown: bool,
}

/// Response for the alert state listing
#[derive(Debug, Serialize)]
pub struct AlertStateList {
    pub states: Vec<AlertStateEntry>,
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// List recorded alert state for every anomaly type
async fn list_alert_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.deduper.states().await {
        Ok(states) => {
            let states = states
                .into_iter()
                .map(|(anomaly_type, alert)| AlertStateEntry {
                    anomaly_type: anomaly_type.to_string(),
                    last_alert_time: alert.last_alert_time,
                    alert_count: alert.alert_count,
                    in_cooldown: state.deduper.in_cooldown(&alert),
                })
                .collect();

            (StatusCode::OK, Json(AlertStateList { states })).into_response()
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Clear all recorded alert state
async fn clear_alert_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.deduper.clear_all_state().await {
        Ok(()) => {
            info!("Alert state cleared via API");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route(
            "/api/v1/alerts/state",
            get(list_alert_state).delete(clear_alert_state),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
