//! Integration tests for the watchdog API endpoints

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceExt;
use watchdog_lib::{
    anomaly::{AlertDeduper, Anomaly, AnomalyType, DedupConfig, Severity},
    clock::SystemClock,
    health::{components, ComponentStatus, HealthRegistry},
    observability::WatchdogMetrics,
    store::MemoryStateStore,
};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: WatchdogMetrics,
    pub deduper: AlertDeduper,
}

#[derive(Debug, Serialize)]
pub struct AlertStateEntry {
    pub anomaly_type: String,
    pub last_alert_time: DateTime<Utc>,
    pub alert_count: u32,
    pub in_cooldown: bool,
}

#[derive(Debug, Serialize)]
pub struct AlertStateList {
    pub states: Vec<AlertStateEntry>,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

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

async fn clear_alert_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.deduper.clear_all_state().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn create_test_router(state: Arc<AppState>) -> Router {
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

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SERVICE_SOURCE).await;
    health_registry.register(components::LLM_SOURCE).await;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStateStore::new(clock.clone()));
    let deduper = AlertDeduper::new(store, clock, DedupConfig::default()).unwrap();

    let state = Arc::new(AppState {
        health_registry,
        metrics: WatchdogMetrics::new(),
        deduper,
    });
    let router = create_test_router(state.clone());

    (router, state)
}

fn sample_anomaly() -> Anomaly {
    Anomaly {
        anomaly_type: AnomalyType::HighErrorRate,
        severity: Severity::High,
        message: "Error rate 12.00% exceeds threshold 5.00%".to_string(),
        observed_value: 12.0,
        threshold: 5.0,
        occurred_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::SERVICE_SOURCE, "Timed out")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::STATE_STORE, "State file unreadable")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.inc_passes();
    state.metrics.observe_pass_duration(0.15);
    state.metrics.inc_anomalies("high_error_rate");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("watchdog_passes_total"));
    assert!(metrics_text.contains("watchdog_pass_duration_seconds_bucket"));
    assert!(metrics_text.contains("watchdog_anomalies_detected_total"));
    assert!(metrics_text.contains("high_error_rate"));
}

#[tokio::test]
async fn test_alert_state_empty_by_default() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/alerts/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let list: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(list["states"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_alert_state_lists_recorded_alerts() {
    let (app, state) = setup_test_app().await;

    state.deduper.record_alerts(&[sample_anomaly()]).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/alerts/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let list: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let states = list["states"].as_array().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0]["anomaly_type"], "high_error_rate");
    assert_eq!(states[0]["alert_count"], 1);
    assert_eq!(states[0]["in_cooldown"], true);
}

#[tokio::test]
async fn test_clear_alert_state() {
    let (app, state) = setup_test_app().await;

    state.deduper.record_alerts(&[sample_anomaly()]).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/alerts/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/alerts/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let list: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(list["states"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(health["components"].is_object());
    assert!(health["components"]["service_source"].is_object());
    assert!(health["components"]["llm_source"].is_object());
}
