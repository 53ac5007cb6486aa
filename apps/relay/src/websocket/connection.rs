//! WebSocket connection registry
//!
//! Tracks every open listener connection for fan-out. The registry never owns
//! a socket: it holds a [`ConnectionHandle`] whose queue feeds the writer task
//! of the session that owns the socket.
//!
//! Registration, deregistration and fan-out all run under one lock, so a
//! connection is never written to after its deregistration returned and never
//! skipped by a fan-out that started after its registration returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::messages::ServerMessage;

/// Identity of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a single write to a connection failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Outbound queue stayed full past the write deadline
    #[error("write deadline exceeded")]
    Timeout,

    /// The session's writer is gone
    #[error("connection closed")]
    Closed,
}

/// Handle for writing to a specific connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,

    /// Queue drained by the session's writer task
    sender: mpsc::Sender<ServerMessage>,

    /// Cancels the owning session
    shutdown: CancellationToken,

    /// When this connection was established (Unix timestamp ms)
    pub connected_at: i64,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<ServerMessage>, shutdown: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
            shutdown,
            connected_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message, waiting at most `deadline` for room
    pub async fn deliver(
        &self,
        msg: ServerMessage,
        deadline: Duration,
    ) -> Result<(), DeliveryError> {
        self.sender
            .send_timeout(msg, deadline)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Token the owning session watches for a registry-driven close
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask the owning session to shut down
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.sender.is_closed()
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Registry of open connections
///
/// Cheap to clone; clones share the same map and lock.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` if it was already registered.
    pub async fn register(&self, handle: ConnectionHandle) -> bool {
        let mut connections = self.connections.lock().await;
        let id = handle.id();
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, handle);

        tracing::debug!(
            connection_id = %id,
            connection_count = connections.len(),
            "Connection registered"
        );
        true
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        let removed = connections.remove(&id).is_some();

        if removed {
            tracing::debug!(
                connection_id = %id,
                connection_count = connections.len(),
                "Connection deregistered"
            );
        }

        removed
    }

    /// Visit every registered connection under the lock (unspecified order)
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&ConnectionHandle),
    {
        let connections = self.connections.lock().await;
        for handle in connections.values() {
            f(handle);
        }
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Write `msg` to every registered connection
    ///
    /// Runs in a single locked pass. Writes proceed concurrently, each bounded
    /// by `deadline`, so one stalled peer cannot hold back the others. Every
    /// connection whose write fails is closed and removed before the lock is
    /// released. A dead peer therefore stays registered until the first
    /// fan-out that fails against it.
    pub async fn fan_out(&self, msg: &ServerMessage, deadline: Duration) -> FanOutReport {
        let mut connections = self.connections.lock().await;

        let outcomes = join_all(connections.values().map(|handle| async move {
            (handle.id(), handle.deliver(msg.clone(), deadline).await)
        }))
        .await;

        let mut report = FanOutReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    if let Some(handle) = connections.remove(&id) {
                        handle.close();
                    }
                    report.pruned += 1;

                    match e {
                        DeliveryError::Timeout => tracing::warn!(
                            connection_id = %id,
                            "Pruned connection: write deadline exceeded"
                        ),
                        DeliveryError::Closed => tracing::debug!(
                            connection_id = %id,
                            "Pruned closed connection"
                        ),
                    }
                }
            }
        }

        report
    }
}
