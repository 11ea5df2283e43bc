use crate::aggregate::{AggregateError, Aggregator};
use crate::config::HealthCheckConfig;
use crate::metrics::Metrics;
use crate::snapshot::Snapshot;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Clone)]
pub struct HttpAppState {
    pub aggregator: Arc<Aggregator>,
    pub proxy: Arc<HealthProxy>,
    pub metrics: Arc<Metrics>,
}

pub struct HealthProxy {
    client: Client,
    upstream_url: String,
    timeout: Duration,
}

impl HealthProxy {
    pub fn new(client: Client, cfg: &HealthCheckConfig) -> Self {
        Self {
            client,
            upstream_url: cfg.upstream_url.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }

    pub async fn check(&self) -> Result<u16, reqwest::Error> {
        let resp = self
            .client
            .get(&self.upstream_url)
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }
}

pub fn build_router(
    aggregator: Arc<Aggregator>,
    proxy: Arc<HealthProxy>,
    metrics: Arc<Metrics>,
) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/system-info", get(system_info_handler))
        .route("/api/health-check", get(health_check_handler))
        .with_state(HttpAppState {
            aggregator,
            proxy,
            metrics,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn system_info_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_snapshot_request();
    let result = state.aggregator.snapshot(&state.metrics).await;
    if result.is_err() {
        state.metrics.inc_snapshot_failure();
    }
    snapshot_response(result)
}

fn snapshot_response(result: Result<Snapshot, AggregateError>) -> Response {
    match result {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => {
            error!(error = %err, "snapshot aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to fetch system info"})),
            )
                .into_response()
        }
    }
}

async fn health_check_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_health_check_request();
    match state.proxy.check().await {
        // Upstream status is forwarded verbatim, body dropped.
        Ok(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Err(err) => {
            state.metrics.inc_health_check_upstream_error();
            warn!(error = %err, "health check upstream unreachable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"status": "error"})),
            )
                .into_response()
        }
    }
}
