//! HTTP route handlers and router assembly
//!
//! - Audio file transfer
//! - Health check endpoints
//! - The websocket relay endpoint (see [`crate::websocket`])

pub mod audio;
pub mod health;

pub use audio::{audio_router, AudioState};
pub use health::{health_router, HealthState};

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::TrackCatalog;
use crate::websocket::{ws_router, Hub, OriginPolicy, WsState};

/// Everything the routes share
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: Hub,
    pub catalog: TrackCatalog,
    pub origin_policy: OriginPolicy,
}

impl AppState {
    /// Build state from configuration, spawning the hub
    pub fn from_config(config: &Config) -> Self {
        Self {
            hub: Hub::spawn(config.hub_settings()),
            catalog: TrackCatalog::new(config.library_path()),
            origin_policy: config.origin_policy(),
        }
    }
}

/// Assemble the full application router
pub fn build_router(state: AppState, cors_layer: CorsLayer) -> Router {
    let audio_state = AudioState::new(state.catalog.root());
    let health_state = HealthState {
        catalog: state.catalog.clone(),
        hub: state.hub.clone(),
    };
    let ws_state = WsState {
        hub: state.hub,
        catalog: state.catalog,
        origin_policy: state.origin_policy,
    };

    Router::new()
        .route("/", get(root))
        // Nested health routes: /health, /health/live, /health/ready
        .nest("/health", health_router(health_state))
        .merge(audio_router(audio_state))
        .merge(ws_router(ws_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
}

/// Build the CORS layer based on configuration.
///
/// In production mode:
/// - If `CORS_ORIGINS` is set, only those origins are allowed
/// - If `CORS_ORIGINS` is not set, CORS requests are rejected (no origins allowed)
///
/// In development mode:
/// - If `CORS_ORIGINS` is set, those origins are used
/// - If `CORS_ORIGINS` is not set, permissive CORS is used for convenience
pub fn build_cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| {
                    origin.parse().ok().or_else(|| {
                        tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                        None
                    })
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
                return CorsLayer::new();
            }

            tracing::info!(
                "CORS configured with {} allowed origin(s): {:?}",
                allowed_origins.len(),
                origins
            );
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::RANGE])
                .expose_headers([
                    header::CONTENT_RANGE,
                    header::CONTENT_LENGTH,
                    header::ACCEPT_RANGES,
                ])
                .max_age(std::time::Duration::from_secs(3600))
        }
        _ if config.is_production() => {
            tracing::warn!(
                "CORS_ORIGINS not configured in production mode. \
                 CORS requests will be rejected. Set CORS_ORIGINS to allow cross-origin requests."
            );
            CorsLayer::new()
        }
        _ => {
            tracing::warn!(
                "Using permissive CORS in development mode. \
                 Set CORS_ORIGINS for production-like behavior."
            );
            CorsLayer::permissive()
        }
    }
}

async fn root() -> &'static str {
    "Resonance playback relay"
}
