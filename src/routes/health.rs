use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "iptv-proxy",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime: u64,
    playlist_route: String,
    routes: usize,
    tracks: usize,
    dropped: usize,
    /// Unix millis of the last rewrite pass
    generated_at: i64,
    xtream: bool,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let snapshot = Arc::clone(&*state.snapshot.read().await);

    Json(HealthResponse {
        status: "ok",
        uptime,
        playlist_route: format!(
            "{}{}",
            state.identity.custom_prefix(),
            snapshot.routes.playlist_route()
        ),
        routes: snapshot.routes.len(),
        tracks: snapshot.tracks,
        dropped: snapshot.dropped,
        generated_at: snapshot.generated_at,
        xtream: state.identity.upstream.is_some(),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness: the proxied playlist has been written
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.config.xtream_auto() || state.config.m3u_url.is_empty() {
        return (StatusCode::OK, "ready");
    }

    let snapshot = Arc::clone(&*state.snapshot.read().await);
    match tokio::fs::metadata(snapshot.routes.playlist_file()).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready - playlist missing"),
    }
}

/// Liveness (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
