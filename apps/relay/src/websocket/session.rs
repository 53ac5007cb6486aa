//! Per-connection session
//!
//! A session owns one client transport for its whole life:
//!
//! 1. register with the hub's registry
//! 2. send the song-list handshake (best effort, always the first frame)
//! 3. decode inbound frames and publish them to the hub until the peer goes
//!    away, a frame fails to decode, the transport errors, or a write to the
//!    peer fails
//! 4. deregister and release the transport
//!
//! The session is generic over a stream of inbound text frames and a sink of
//! outbound text frames, so it runs the same over a real websocket or over
//! in-memory channels.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::connection::ConnectionId;
use super::hub::Hub;
use super::messages::{ControlMessage, ServerMessage, SongListMessage};
use crate::services::TrackCatalog;

/// Upper bound on flushing and closing the transport at session end
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Inbound stream finished (close frame or EOF)
    PeerClosed,
    /// Reading from the transport failed
    TransportError,
    /// A frame was not a valid control message
    MalformedFrame,
    /// A write to the peer failed and the connection was closed
    Pruned,
    /// The hub's broadcaster is gone
    HubStopped,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::PeerClosed => "peer_closed",
            SessionEnd::TransportError => "transport_error",
            SessionEnd::MalformedFrame => "malformed_frame",
            SessionEnd::Pruned => "pruned",
            SessionEnd::HubStopped => "hub_stopped",
        }
    }
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drive one connection from registration to release
pub async fn run_session<R, W, E>(
    hub: Hub,
    catalog: TrackCatalog,
    mut inbound: R,
    outbound: W,
) -> SessionEnd
where
    R: Stream<Item = Result<String, E>> + Unpin + Send,
    E: std::fmt::Display + Send,
    W: Sink<String> + Unpin + Send + 'static,
    W::Error: std::fmt::Display + Send,
{
    let (handle, outbound_rx) = hub.open_connection();
    let connection_id = handle.id();
    let connected_at = handle.connected_at;
    let shutdown = handle.shutdown_token();

    hub.registry().register(handle).await;

    let songs = match catalog.list_tracks().await {
        Ok(songs) => songs,
        Err(e) => {
            tracing::warn!(
                error = %e,
                connection_id = %connection_id,
                "Catalog unavailable, sending empty song list"
            );
            Vec::new()
        }
    };
    let handshake = ServerMessage::from(SongListMessage { songs });

    let writer = tokio::spawn(run_writer(
        connection_id,
        outbound,
        outbound_rx,
        handshake,
        shutdown.clone(),
    ));

    let end = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Pruned,
            frame = inbound.next() => match frame {
                None => break SessionEnd::PeerClosed,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, connection_id = %connection_id, "Transport read failed");
                    break SessionEnd::TransportError;
                }
                Some(Ok(text)) => match ControlMessage::decode(&text) {
                    Ok(event) => {
                        tracing::debug!(
                            connection_id = %connection_id,
                            action = %event.action,
                            title = %event.payload.title,
                            "Control message received"
                        );
                        if hub.publish(event).is_err() {
                            tracing::error!(connection_id = %connection_id, "Broadcaster stopped");
                            break SessionEnd::HubStopped;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, connection_id = %connection_id, "Failed to decode frame");
                        break SessionEnd::MalformedFrame;
                    }
                },
            },
        }
    };

    hub.registry().deregister(connection_id).await;
    shutdown.cancel();

    if let Err(e) = writer.await {
        tracing::error!(error = %e, connection_id = %connection_id, "Writer task failed");
    }

    tracing::debug!(
        connection_id = %connection_id,
        reason = %end,
        connected_ms = chrono::Utc::now().timestamp_millis() - connected_at,
        "Session finished"
    );

    end
}

/// Forward queued frames to the transport
///
/// Writes the handshake first. The first failed write after the handshake
/// cancels the session, which deregisters the connection.
async fn run_writer<W>(
    connection_id: ConnectionId,
    mut sink: W,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
    handshake: ServerMessage,
    shutdown: CancellationToken,
) where
    W: Sink<String> + Unpin,
    W::Error: std::fmt::Display + Send,
{
    match handshake.encode() {
        Ok(json) => {
            tokio::select! {
                result = sink.send(json) => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, connection_id = %connection_id, "Failed to send song list");
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize song list");
        }
    }

    loop {
        let msg = tokio::select! {
            msg = outbound_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let json = match msg.encode() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                continue;
            }
        };

        tokio::select! {
            result = sink.send(json) => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, connection_id = %connection_id, "WebSocket send failed");
                    shutdown.cancel();
                    break;
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    drop(outbound_rx);
    if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
        tracing::debug!(connection_id = %connection_id, "Transport close timed out");
    }
}
