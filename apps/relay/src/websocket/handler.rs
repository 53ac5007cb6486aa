//! WebSocket upgrade handler
//!
//! Checks the request origin, upgrades the connection and hands the socket to
//! a session. Everything that can go wrong here stays local to the one
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{future, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::error::ApiError;
use crate::services::TrackCatalog;

use super::hub::Hub;
use super::session::run_session;

/// Which browser origins may open a relay connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every origin
    #[default]
    Any,
    /// Accept only the listed origins (normalized)
    AllowList(Vec<String>),
}

impl OriginPolicy {
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::AllowList(
            origins
                .into_iter()
                .map(|o| normalize_origin(o.as_ref()))
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }

    /// Whether a request carrying `origin` may upgrade
    ///
    /// Requests without an `Origin` header come from non-browser clients and
    /// are always accepted.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (OriginPolicy::Any, _) | (_, None) => true,
            (OriginPolicy::AllowList(allowed), Some(origin)) => {
                let origin = normalize_origin(origin);
                allowed.iter().any(|a| *a == origin)
            }
        }
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Shared state for the upgrade route
#[derive(Debug, Clone)]
pub struct WsState {
    pub hub: Hub,
    pub catalog: TrackCatalog,
    pub origin_policy: OriginPolicy,
}

/// Create the relay router (`GET /ws`)
pub fn ws_router(state: WsState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

/// Inbound frame that could not be turned into text
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("binary frame is not valid UTF-8: {0}")]
    NotUtf8(#[from] FromUtf8Error),
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    if !state.origin_policy.allows(origin) {
        tracing::warn!(origin = ?origin, "WebSocket upgrade rejected: origin not allowed");
        return ApiError::Forbidden("Origin not allowed".to_string()).into_response();
    }

    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(error = %e, peer = ?peer, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Run a session over an upgraded socket
async fn handle_socket(socket: WebSocket, state: WsState, peer: Option<SocketAddr>) {
    tracing::info!(peer = ?peer, "WebSocket connection opened");

    let (sender, receiver) = socket.split();

    let inbound = receiver
        .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| future::ready(text_frame(frame)));
    let outbound = sender.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));

    let end = run_session(state.hub, state.catalog, inbound, outbound).await;

    tracing::info!(peer = ?peer, reason = %end, "WebSocket connection closed");
}

/// Reduce a websocket message to the text frame a session reads
///
/// Control frames are skipped; axum answers pings itself.
fn text_frame(frame: Result<Message, axum::Error>) -> Option<Result<String, FrameError>> {
    match frame {
        Ok(Message::Text(text)) => Some(Ok(text)),
        Ok(Message::Binary(bytes)) => Some(String::from_utf8(bytes).map_err(FrameError::from)),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Close(_)) => None,
        Err(e) => Some(Err(FrameError::from(e))),
    }
}
