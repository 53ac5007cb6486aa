//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Kubernetes-style liveness probe
//! - `GET /health/ready` - Readiness check (library readable)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::services::TrackCatalog;
use crate::websocket::Hub;

/// Shared state for health check handlers
#[derive(Debug, Clone)]
pub struct HealthState {
    pub catalog: TrackCatalog,
    pub hub: Hub,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub library_readable: bool,
    pub connections: usize,
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .route("/ready", get(readiness_probe))
        .with_state(state)
}

/// Always OK while the server answers requests
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe
///
/// Does not look at the library; that is what readiness is for.
async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe
///
/// # Response
/// - 200 OK if the library directory can be listed
/// - 503 Service Unavailable otherwise
async fn readiness_probe(State(state): State<HealthState>) -> impl IntoResponse {
    let library_readable = state.catalog.is_readable().await;
    let connections = state.hub.connection_count().await;

    let (status_code, status) = if library_readable {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!(path = %state.catalog.root().display(), "Music library is not readable");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            library_readable,
            connections,
        }),
    )
}
