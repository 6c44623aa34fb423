//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use scribe_common::time::seconds_since;

use crate::services::ServiceHealth;
use crate::AppState;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("scribe-backend")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

/// Backend readiness response
#[derive(Debug, Serialize)]
pub struct ServicesHealthResponse {
    /// "healthy" when every model backend is, else "degraded"
    pub status: String,
    pub backend: String,
    pub services: Vec<ServiceHealth>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "scribe-backend".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: seconds_since(state.startup_time),
    })
}

/// GET /api/health
///
/// Health-checks every configured model backend.
pub async fn services_health(State(state): State<AppState>) -> Json<ServicesHealthResponse> {
    let report = state.orchestrator.check_health().await;

    Json(ServicesHealthResponse {
        status: if report.all_healthy { "healthy" } else { "degraded" }.to_string(),
        backend: "running".to_string(),
        services: report.services,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(services_health))
}
