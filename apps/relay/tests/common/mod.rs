//! Shared fixtures for relay integration tests

#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use axum::Router;
use futures_util::{Sink, Stream};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use resonance_relay::services::TrackCatalog;
use resonance_relay::websocket::{Action, AudioInfo, ControlMessage, Hub, HubSettings, OriginPolicy};
use resonance_relay::{build_router, AppState};

/// Library directory holding the given files
pub fn library_with(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

pub fn test_state(library: &Path, origin_policy: OriginPolicy) -> AppState {
    AppState {
        hub: Hub::spawn(HubSettings::default()),
        catalog: TrackCatalog::new(library),
        origin_policy,
    }
}

pub fn test_app(state: AppState) -> Router {
    build_router(state, CorsLayer::permissive())
}

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

/// Client side of an in-memory transport
pub struct MemoryClient {
    pub to_server: mpsc::UnboundedSender<String>,
    pub from_server: mpsc::UnboundedReceiver<String>,
}

impl MemoryClient {
    pub fn send(&self, msg: &ControlMessage) {
        self.to_server
            .send(serde_json::to_string(msg).unwrap())
            .unwrap();
    }

    /// Next frame from the server as JSON, failing after two seconds
    pub async fn recv_json(&mut self) -> serde_json::Value {
        let frame = tokio::time::timeout(Duration::from_secs(2), self.from_server.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server side closed");
        serde_json::from_str(&frame).unwrap()
    }
}

/// An in-memory transport: the client half and the stream/sink a session runs on
pub fn memory_transport() -> (
    MemoryClient,
    impl Stream<Item = Result<String, Infallible>> + Unpin + Send,
    impl Sink<String, Error = mpsc::error::SendError<String>> + Unpin + Send + 'static,
) {
    let (to_server, inbound_rx) = mpsc::unbounded_channel::<String>();
    let (outbound_tx, from_server) = mpsc::unbounded_channel::<String>();

    let inbound = Box::pin(futures_util::stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok::<_, Infallible>(frame), rx))
    }));
    let outbound = Box::pin(futures_util::sink::unfold(
        outbound_tx,
        |tx, frame: String| async move {
            tx.send(frame)?;
            Ok::<_, mpsc::error::SendError<String>>(tx)
        },
    ));

    (
        MemoryClient {
            to_server,
            from_server,
        },
        inbound,
        outbound,
    )
}

pub fn control(action: Action, title: &str) -> ControlMessage {
    ControlMessage::new(
        action,
        AudioInfo {
            title: title.to_string(),
            size: 4096,
            duration: 12.5,
        },
    )
}

pub fn control_json(action: Action, title: &str) -> serde_json::Value {
    serde_json::to_value(control(action, title)).unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if condition().await {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
