//! Resonance playback relay
//!
//! Keeps every connected listener's player in step: control messages (play,
//! pause, seek, track change) sent by one client over `/ws` are relayed to
//! every connected client, and the audio files themselves are served from a
//! flat music library over `/get-audio`.

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod websocket;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{build_cors_layer, build_router, AppState};
